use image::imageops::{self, FilterType};
use image::{Pixel, Rgba};
use imageproc::definitions::Image;
use imageproc::map::map_colors;

use crate::utils::{clamp_f32_to_primitive, normalize_alpha_with_max};

/// Dense RGBA pixel buffer shared by every extraction phase.
///
/// `ImageBuffer` guarantees the backing plane is exactly `width * height * 4`
/// bytes long.
pub type Raster = Image<Rgba<u8>>;

/// Trait for flattening transparency onto a solid white background.
///
/// Both inputs of diff matting are flattened first, so a transparent PNG
/// and an opaque JPEG of the same photograph diff identically.
pub trait FlattenOntoWhite {
    /// Composites every pixel over white and returns a fully opaque image.
    fn flatten_onto_white(&self) -> Self;

    /// In-place variant of [`FlattenOntoWhite::flatten_onto_white`].
    fn flatten_onto_white_mut(&mut self) -> &mut Self;
}

impl FlattenOntoWhite for Raster {
    fn flatten_onto_white(&self) -> Self {
        map_colors(self, flatten_pixel)
    }

    fn flatten_onto_white_mut(&mut self) -> &mut Self {
        self.pixels_mut()
            .for_each(|pixel| *pixel = flatten_pixel(*pixel));
        self
    }
}

#[inline]
fn flatten_pixel(pixel: Rgba<u8>) -> Rgba<u8> {
    let Rgba([red, green, blue, alpha]) = pixel;
    if alpha == u8::MAX {
        return pixel;
    }
    let alpha = normalize_alpha_with_max(alpha, 255.0);
    let over_white = |channel: u8| -> u8 {
        clamp_f32_to_primitive((f32::from(channel) * alpha + 255.0 * (1.0 - alpha)).round())
    };
    Rgba([over_white(red), over_white(green), over_white(blue), u8::MAX])
}

/// Trait for discarding transparency while keeping color.
///
/// Used by the extraction fallback, which returns the composite untouched
/// apart from a fully opaque alpha channel.
pub trait ForceOpaque {
    fn force_opaque(self) -> Self;
}

impl ForceOpaque for Raster {
    fn force_opaque(mut self) -> Self {
        self.pixels_mut()
            .for_each(|pixel| pixel.channels_mut()[3] = u8::MAX);
        self
    }
}

/// Resamples `image` to exactly `width × height` when it differs.
pub(crate) fn resample_to(image: &Raster, width: u32, height: u32) -> Raster {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FilterType::Lanczos3)
    }
}
