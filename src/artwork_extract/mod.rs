pub mod auto_crop;
pub mod codec;
pub mod component_filter;
pub mod compositor;
pub mod config;
pub mod diff_matting;
pub mod grid_detector;
pub mod mask;
pub mod mask_refiner;
pub mod pipeline;
pub mod raster;
