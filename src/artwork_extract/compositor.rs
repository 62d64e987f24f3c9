use image::imageops::{self, FilterType};

use crate::artwork_extract::raster::Raster;
use crate::error::CompositeError;

/// Where and how large extracted artwork lands on a product photo.
///
/// All values are fractions of the target canvas: the artwork is resized to
/// `scale × target width` (keeping its aspect ratio) and its top-left corner
/// is placed at `(offset_x × target width, offset_y × target height)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Placement {
    pub const fn new(scale: f32, offset_x: f32, offset_y: f32) -> Self {
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    fn validate(&self) -> Result<(), CompositeError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(CompositeError::InvalidPlacement(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if !(self.offset_x.is_finite() && self.offset_y.is_finite()) {
            return Err(CompositeError::InvalidPlacement(format!(
                "offsets must be finite, got ({}, {})",
                self.offset_x, self.offset_y
            )));
        }
        Ok(())
    }
}

/// Product photos with a known print area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Tote,
    Mug,
    TeeWhite,
    TeeBlack,
}

impl Product {
    /// Print-area placement on the product photo.
    pub const fn placement(self) -> Placement {
        match self {
            Self::Tote => Placement::new(0.42, 0.26, 0.46),
            Self::Mug => Placement::new(0.325, 0.35, 0.39),
            Self::TeeWhite | Self::TeeBlack => Placement::new(0.36, 0.31, 0.26),
        }
    }

    /// Whether the product photo ships a fabric overlay layered above the artwork.
    pub const fn has_overlay(self) -> bool {
        matches!(self, Self::TeeWhite | Self::TeeBlack)
    }
}

/// Largest scaled artwork area, as a multiple of the target area.
pub const MAX_ARTWORK_TO_TARGET_AREA: f64 = 16.0;

/// Computes the scaled artwork size and its top-left position on the target.
///
/// # Errors
///
/// * `CompositeError::EmptyImage` - If either size has a zero dimension
/// * `CompositeError::InvalidPlacement` - If the placement is unusable or the
///   scaled artwork would be empty or larger than
///   [`MAX_ARTWORK_TO_TARGET_AREA`] times the target
pub fn calculate_layout(
    artwork_size: (u32, u32),
    target_size: (u32, u32),
    placement: &Placement,
) -> Result<((u32, u32), (i64, i64)), CompositeError> {
    placement.validate()?;
    for (width, height) in [artwork_size, target_size] {
        if width == 0 || height == 0 {
            return Err(CompositeError::EmptyImage { width, height });
        }
    }

    let (art_width, art_height) = artwork_size;
    let (target_width, target_height) = target_size;

    let width = (target_width as f32 * placement.scale).round();
    let height = (art_height as f32 * width / art_width as f32).round();
    if width < 1.0 || height < 1.0 {
        return Err(CompositeError::InvalidPlacement(format!(
            "scaled artwork would be {width}x{height}"
        )));
    }
    let area_limit = MAX_ARTWORK_TO_TARGET_AREA * target_width as f64 * target_height as f64;
    if f64::from(width) * f64::from(height) > area_limit {
        return Err(CompositeError::InvalidPlacement(format!(
            "scaled artwork {width}x{height} exceeds {MAX_ARTWORK_TO_TARGET_AREA}x the target area"
        )));
    }

    let left = (target_width as f32 * placement.offset_x).round() as i64;
    let top = (target_height as f32 * placement.offset_y).round() as i64;

    Ok(((width as u32, height as u32), (left, top)))
}

/// Places extracted artwork onto a product photo.
///
/// The artwork is resized per `placement`, alpha-composited over `target`,
/// and `overlay` (if any) is composited on top at the origin.
pub fn place_artwork(
    artwork: &Raster,
    target: &Raster,
    placement: &Placement,
    overlay: Option<&Raster>,
) -> Result<Raster, CompositeError> {
    let ((width, height), (left, top)) =
        calculate_layout(artwork.dimensions(), target.dimensions(), placement)?;

    let scaled = imageops::resize(artwork, width, height, FilterType::Lanczos3);
    let mut canvas = target.clone();
    imageops::overlay(&mut canvas, &scaled, left, top);

    if let Some(overlay) = overlay {
        imageops::overlay(&mut canvas, overlay, 0, 0);
    }

    Ok(canvas)
}
