//! Test utilities for artwork-extract
//!
//! Fixture builders shared by the unit tests. Only compiled for tests.

use image::Rgba;

use crate::artwork_extract::config::GridConfig;
use crate::artwork_extract::raster::Raster;

/// Fully transparent black raster.
pub fn transparent_raster(width: u32, height: u32) -> Raster {
    Raster::from_pixel(width, height, Rgba([0, 0, 0, 0]))
}

/// Opaque raster filled with one color.
pub fn solid_raster(width: u32, height: u32, rgb: [u8; 3]) -> Raster {
    let [red, green, blue] = rgb;
    Raster::from_pixel(width, height, Rgba([red, green, blue, 255]))
}

/// Fills a rectangle (clipped to the raster) and returns the raster.
pub fn fill_rect(
    mut raster: Raster,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: Rgba<u8>,
) -> Raster {
    let x_end = (x + width).min(raster.width());
    let y_end = (y + height).min(raster.height());
    for py in y..y_end {
        for px in x..x_end {
            raster.put_pixel(px, py, color);
        }
    }
    raster
}

/// Checkerboard of square blocks in the configured white and gray, with a
/// white block at the origin.
pub fn checkerboard(width: u32, height: u32, block: u32, config: &GridConfig) -> Raster {
    let [wr, wg, wb] = config.white;
    let [gr, gg, gb] = config.gray;
    Raster::from_fn(width, height, |x, y| {
        if (x / block + y / block) % 2 == 0 {
            Rgba([wr, wg, wb, 255])
        } else {
            Rgba([gr, gg, gb, 255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_blocks() {
        let config = GridConfig::default();
        let board = checkerboard(8, 8, 4, &config);
        assert_eq!(board.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(board.get_pixel(4, 0), &Rgba([204, 204, 204, 255]));
        assert_eq!(board.get_pixel(4, 4), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let raster = fill_rect(transparent_raster(4, 4), 2, 2, 10, 10, Rgba([1, 1, 1, 1]));
        assert_eq!(raster.get_pixel(3, 3), &Rgba([1, 1, 1, 1]));
        assert_eq!(raster.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }
}
