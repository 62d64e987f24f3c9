use image::{Pixel, Rgba};

use crate::artwork_extract::raster::Raster;
use crate::utils::{validate_matching_dimensions, PixelGrid};
use crate::ExtractError;

/// Background-removal mask produced by checkerboard detection.
///
/// All planes are dense and indexed by row-major pixel offset. `protected`
/// pixels are never marked as removed; `overrides` hold partial alpha values
/// written by edge smoothing and feathering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalMask {
    grid: PixelGrid,
    removed: Vec<bool>,
    protected: Vec<bool>,
    overrides: Vec<Option<u8>>,
}

impl RemovalMask {
    pub fn new(width: u32, height: u32) -> Self {
        let grid = PixelGrid::new(width, height);
        Self {
            grid,
            removed: vec![false; grid.len()],
            protected: vec![false; grid.len()],
            overrides: vec![None; grid.len()],
        }
    }

    pub(crate) fn from_planes(grid: PixelGrid, removed: Vec<bool>, protected: Vec<bool>) -> Self {
        debug_assert_eq!(removed.len(), grid.len());
        debug_assert_eq!(protected.len(), grid.len());
        let removed = removed
            .into_iter()
            .zip(&protected)
            .map(|(removed, &protected)| removed && !protected)
            .collect();
        Self {
            grid,
            removed,
            protected,
            overrides: vec![None; grid.len()],
        }
    }

    pub const fn grid(&self) -> PixelGrid {
        self.grid
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        (self.grid.width, self.grid.height)
    }

    #[inline]
    pub fn is_removed(&self, index: usize) -> bool {
        self.removed[index]
    }

    #[inline]
    pub fn is_protected(&self, index: usize) -> bool {
        self.protected[index]
    }

    #[inline]
    pub fn alpha_override(&self, index: usize) -> Option<u8> {
        self.overrides[index]
    }

    /// Marks or clears a pixel. Protected pixels cannot be marked.
    pub fn set_removed(&mut self, index: usize, removed: bool) {
        self.removed[index] = removed && !self.protected[index];
    }

    pub fn set_override(&mut self, index: usize, alpha: Option<u8>) {
        self.overrides[index] = alpha;
    }

    pub(crate) fn removed_plane(&self) -> &[bool] {
        &self.removed
    }

    pub(crate) fn override_plane(&self) -> &[Option<u8>] {
        &self.overrides
    }

    pub fn removed_count(&self) -> usize {
        self.removed.iter().filter(|&&removed| removed).count()
    }

    /// Fraction of all pixels marked as removed.
    pub fn removed_fraction(&self) -> f32 {
        if self.grid.is_empty() {
            0.0
        } else {
            self.removed_count() as f32 / self.grid.len() as f32
        }
    }
}

/// Trait for applying a [`RemovalMask`] to the alpha channel of an RGBA image.
///
/// The resulting alpha of each pixel is the override when present, `0` when
/// the pixel is marked as removed, and the original alpha otherwise.
pub trait ApplyRemovalMask {
    fn apply_removal_mask(self, mask: &RemovalMask) -> Result<Self, ExtractError>
    where
        Self: Sized;

    fn apply_removal_mask_mut(&mut self, mask: &RemovalMask) -> Result<&mut Self, ExtractError>;
}

impl ApplyRemovalMask for Raster {
    fn apply_removal_mask(mut self, mask: &RemovalMask) -> Result<Self, ExtractError> {
        self.apply_removal_mask_mut(mask)?;
        Ok(self)
    }

    fn apply_removal_mask_mut(&mut self, mask: &RemovalMask) -> Result<&mut Self, ExtractError> {
        validate_matching_dimensions(mask.dimensions(), self.dimensions())?;

        self.pixels_mut()
            .zip(mask.removed.iter().zip(&mask.overrides))
            .for_each(|(pixel, (&removed, &alpha_override))| {
                let Rgba([_, _, _, alpha]) = *pixel;
                let alpha = match alpha_override {
                    Some(value) => value,
                    None if removed => 0,
                    None => alpha,
                };
                pixel.channels_mut()[3] = alpha;
            });

        Ok(self)
    }
}
