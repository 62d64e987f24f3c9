mod artwork_extract;
mod error;
#[cfg(test)]
mod test_utils;
mod utils;

use image::{ImageBuffer, Pixel};

pub use artwork_extract::auto_crop::AutoCrop;
pub use artwork_extract::codec::{decode, encode_png};
pub use artwork_extract::component_filter::{
    label_components, remove_distant_components, restore_under_matted, Bounds, Component,
    ComponentFilter, FilterReport,
};
pub use artwork_extract::compositor::{
    calculate_layout, place_artwork, Placement, Product, MAX_ARTWORK_TO_TARGET_AREA,
};
pub use artwork_extract::config::{
    ComponentFilterConfig, DiffMattingConfig, ExtractionConfig, GridConfig, RestorationConfig,
};
pub use artwork_extract::diff_matting::{
    extract_with_base, matte_alpha, remove_isolated_noise, unmix_pixel, DiffMap,
};
pub use artwork_extract::grid_detector::{extract_with_grid, GridColor, GridPatternDetector};
pub use artwork_extract::mask::{ApplyRemovalMask, RemovalMask};
pub use artwork_extract::mask_refiner::MaskRefiner;
pub use artwork_extract::pipeline::{extract_design, render_preview, Extraction, ExtractionPath};
pub use artwork_extract::raster::{FlattenOntoWhite, ForceOpaque, Raster};
pub use error::{CompositeError, ExtractError, PreviewError};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;
