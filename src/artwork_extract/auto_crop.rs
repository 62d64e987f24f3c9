use image::{GenericImageView, Pixel, Rgba};
use imageproc::definitions::Image;

/// Trait for trimming an RGBA image to its non-transparent content.
pub trait AutoCrop {
    /// Tight bounding box `[x, y, width, height]` of pixels with `alpha > 0`,
    /// or `None` when every pixel is transparent.
    fn content_bounds(&self) -> Option<[u32; 4]>;

    /// Crops to [`AutoCrop::content_bounds`].
    ///
    /// A fully transparent image is returned unchanged; that is not an error.
    fn auto_crop(&self) -> Self;
}

impl AutoCrop for Image<Rgba<u8>> {
    fn content_bounds(&self) -> Option<[u32; 4]> {
        let mut bounds: Option<[u32; 4]> = None; // [x1, y1, x2, y2]

        for (x, y, pixel) in self.enumerate_pixels() {
            if pixel.channels()[3] > 0 {
                match bounds.as_mut() {
                    Some(bounds) => update_bounds(bounds, x, y),
                    None => bounds = Some([x, y, x, y]),
                }
            }
        }

        bounds.map(|[x1, y1, x2, y2]| [x1, y1, x2 - x1 + 1, y2 - y1 + 1])
    }

    fn auto_crop(&self) -> Self {
        match self.content_bounds() {
            Some([x, y, width, height]) => self.view(x, y, width, height).to_image(),
            None => self.clone(),
        }
    }
}

fn update_bounds(bounds: &mut [u32; 4], x: u32, y: u32) {
    bounds[0] = bounds[0].min(x);
    bounds[1] = bounds[1].min(y);
    bounds[2] = bounds[2].max(x);
    bounds[3] = bounds[3].max(y);
}
