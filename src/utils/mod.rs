//! Internal utility functions for artwork-extract.
//!
//! This module contains common functionality used across the extraction phases:
//! parameter validation, channel arithmetic and flat row-major pixel addressing.

use image::Primitive;
use imageproc::definitions::Clamp;

use crate::error::ExtractError;

/// Offsets of the 8-connected neighbourhood, row by row.
pub const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Offsets of the 4-connected neighbourhood: left, right, up, down.
pub const NEIGHBORS_4: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Clamps a floating-point value to the range of a primitive type.
#[inline]
pub fn clamp_f32_to_primitive<T: Primitive + Clamp<f32>>(value: f32) -> T {
    T::clamp(value)
}

/// Normalizes an alpha value using a pre-computed max value.
///
/// This is more efficient when processing multiple pixels with the same type.
#[inline]
pub fn normalize_alpha_with_max<S>(alpha: S, max_value: f32) -> f32
where
    S: Into<f32> + Primitive,
{
    alpha.into() / max_value
}

/// Euclidean distance between two RGB triples.
#[inline]
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = f32::from(a[0]) - f32::from(b[0]);
    let dg = f32::from(a[1]) - f32::from(b[1]);
    let db = f32::from(a[2]) - f32::from(b[2]);
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Validates that an image has non-zero dimensions.
///
/// # Arguments
///
/// * `width` - The width of the image
/// * `height` - The height of the image
/// * `context` - A description of the context for error messages
pub fn validate_non_empty_image(width: u32, height: u32, context: &str) -> Result<(), ExtractError> {
    if width == 0 || height == 0 {
        Err(ExtractError::Decode(format!(
            "{context}: image dimensions must be non-zero, got {width}x{height}"
        )))
    } else {
        Ok(())
    }
}

/// Validates that two images have matching dimensions.
pub fn validate_matching_dimensions(
    expected: (u32, u32),
    actual: (u32, u32),
) -> Result<(), ExtractError> {
    if expected != actual {
        Err(ExtractError::DimensionMismatch { expected, actual })
    } else {
        Ok(())
    }
}

/// Flat row-major addressing over a `width × height` pixel plane.
///
/// Every per-pixel buffer in the crate (diff map, masks, labels) is a flat
/// `Vec` indexed through this type, so bounds checks live in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelGrid {
    pub width: u32,
    pub height: u32,
}

impl PixelGrid {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub const fn coords(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }

    /// Returns the coordinates of `(x + dx, y + dy)` when they fall inside the plane.
    #[inline]
    pub fn offset(&self, x: u32, y: u32, dx: i32, dy: i32) -> Option<(u32, u32)> {
        let nx = i64::from(x) + i64::from(dx);
        let ny = i64::from(y) + i64::from(dy);
        if nx < 0 || ny < 0 || nx >= i64::from(self.width) || ny >= i64::from(self.height) {
            None
        } else {
            Some((nx as u32, ny as u32))
        }
    }

    /// Like [`PixelGrid::offset`] but returns the flat index.
    #[inline]
    pub fn offset_index(&self, x: u32, y: u32, dx: i32, dy: i32) -> Option<usize> {
        self.offset(x, y, dx, dy).map(|(nx, ny)| self.index(nx, ny))
    }

    /// Iterates the in-bounds 8-neighbours of `(x, y)` as flat indices.
    pub fn neighbors8(&self, x: u32, y: u32) -> impl Iterator<Item = usize> + '_ {
        NEIGHBORS_8
            .iter()
            .filter_map(move |&(dx, dy)| self.offset_index(x, y, dx, dy))
    }

    /// Inclusive square window of the given radius, clipped to the plane.
    ///
    /// Returns `(x0, y0, x1, y1)`.
    #[inline]
    pub fn window(&self, x: u32, y: u32, radius: u32) -> (u32, u32, u32, u32) {
        (
            x.saturating_sub(radius),
            y.saturating_sub(radius),
            x.saturating_add(radius).min(self.width - 1),
            y.saturating_add(radius).min(self.height - 1),
        )
    }
}
