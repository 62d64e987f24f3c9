//! Declarative parameters for both extraction paths.
//!
//! Every threshold the pipeline uses lives here and is passed explicitly
//! into each phase, so the whole pipeline can be exercised against
//! alternative presets.

use crate::error::ExtractError;

/// Parameters of the connected-component filter.
///
/// Two named presets exist because the extraction paths were tuned
/// separately; see [`ComponentFilterConfig::permissive`] and
/// [`ComponentFilterConfig::strict`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentFilterConfig {
    /// Absolute lower bound of the size threshold, in pixels
    pub min_component_pixels: usize,
    /// Size threshold as a fraction of the main component
    pub size_fraction: f32,
    /// Components thinner than this (pixels / longest bbox side) are removable
    pub thinness: f32,
    /// Components farther than this from the main component are erased
    pub proximity_radius: Option<u32>,
}

impl ComponentFilterConfig {
    /// Preset used by diff matting: 1.5 % of the main component, 4px thinness,
    /// 90px proximity radius.
    pub const fn permissive() -> Self {
        Self {
            min_component_pixels: 240,
            size_fraction: 0.015,
            thinness: 4.0,
            proximity_radius: Some(90),
        }
    }

    /// Preset used by checkerboard removal: 40 % of the main component,
    /// 6px thinness, no proximity pass.
    pub const fn strict() -> Self {
        Self {
            min_component_pixels: 240,
            size_fraction: 0.40,
            thinness: 6.0,
            proximity_radius: None,
        }
    }

    /// Size threshold for a given main component size.
    pub fn size_threshold(&self, main_size: usize) -> f32 {
        (self.min_component_pixels as f32).max(main_size as f32 * self.size_fraction)
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        if !(self.size_fraction.is_finite() && self.size_fraction >= 0.0) {
            return Err(ExtractError::InvalidParameter(format!(
                "size_fraction must be a non-negative number, got {}",
                self.size_fraction
            )));
        }
        if !(self.thinness.is_finite() && self.thinness >= 0.0) {
            return Err(ExtractError::InvalidParameter(format!(
                "thinness must be a non-negative number, got {}",
                self.thinness
            )));
        }
        Ok(())
    }
}

impl Default for ComponentFilterConfig {
    fn default() -> Self {
        Self::permissive()
    }
}

/// Parameters of the under-matting restoration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestorationConfig {
    /// Pixels at or above this alpha are left untouched
    pub opaque_floor: u8,
    /// Chebyshev dilation applied to the surviving mask before restoring.
    ///
    /// A non-zero radius lets restoration reach pixels the matting cleared,
    /// which means some pixels with a distance at or below the tolerance can
    /// become opaque again.
    pub dilation_radius: u8,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            opaque_floor: 230,
            dilation_radius: 0,
        }
    }
}

/// Parameters of diff matting against a blank base image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffMattingConfig {
    /// Color distance at or below which a pixel is background
    pub tolerance: f32,
    /// Alpha below which the composite color is used instead of unmixing
    pub min_unmix_alpha: f32,
    /// Isolated pixels below this alpha are treated as noise; `None` skips the pass
    pub noise_alpha_ceiling: Option<u8>,
    pub components: ComponentFilterConfig,
    /// `None` skips the restoration pass
    pub restoration: Option<RestorationConfig>,
}

impl DiffMattingConfig {
    /// Default configuration with a custom tolerance.
    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        if !(self.tolerance.is_finite() && (0.0..255.0).contains(&self.tolerance)) {
            return Err(ExtractError::InvalidParameter(format!(
                "tolerance must be within [0, 255), got {}",
                self.tolerance
            )));
        }
        if !(self.min_unmix_alpha.is_finite() && self.min_unmix_alpha > 0.0) {
            return Err(ExtractError::InvalidParameter(format!(
                "min_unmix_alpha must be positive, got {}",
                self.min_unmix_alpha
            )));
        }
        self.components.validate()
    }
}

impl Default for DiffMattingConfig {
    fn default() -> Self {
        Self {
            tolerance: 30.0,
            min_unmix_alpha: 0.01,
            noise_alpha_ceiling: Some(128),
            components: ComponentFilterConfig::permissive(),
            restoration: Some(RestorationConfig::default()),
        }
    }
}

/// Parameters of checkerboard placeholder detection and mask refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Light checkerboard color
    pub white: [u8; 3],
    /// Dark checkerboard color
    pub gray: [u8; 3],
    pub base_tolerance: f32,
    pub extended_tolerance: f32,

    // protected regions
    pub protected_min_area: usize,
    pub protected_elongated_area: usize,
    pub protected_aspect_ratio: f32,

    // block detection
    pub max_block_size: u32,
    pub block_uniformity: f32,
    pub min_opposite_neighbors: usize,

    // expansion
    pub expansion_passes: usize,

    // overlay detection
    pub overlay_step: u32,
    pub overlay_radius: u32,
    pub overlay_fraction: f32,
    pub overlay_min_luma: f32,
    pub overlay_max_saturation: u8,

    // refinement
    /// Radius of the centred window whose non-grid share demotes a pixel
    pub refine_radius: u32,
    pub refine_max_non_grid: f32,
    pub refine_keep_radius: u32,
    pub refine_keep_fraction: f32,

    // partial removal near edges
    pub seam_radius: u32,
    pub seam_search_cap: u32,
    pub seam_max_distance: u32,

    // mask refinement
    pub edge_min_grid_neighbors: usize,
    pub smooth_removed_weight: f32,
    pub smooth_color_weight: f32,
    pub smooth_low: f32,
    pub smooth_high: f32,
    pub feather_weight: f32,
    pub feather_min_alpha: u8,

    pub components: ComponentFilterConfig,
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ExtractError> {
        if !(self.base_tolerance.is_finite() && self.base_tolerance >= 0.0) {
            return Err(ExtractError::InvalidParameter(format!(
                "base_tolerance must be non-negative, got {}",
                self.base_tolerance
            )));
        }
        if !(self.extended_tolerance >= self.base_tolerance && self.extended_tolerance.is_finite())
        {
            return Err(ExtractError::InvalidParameter(format!(
                "extended_tolerance ({}) must not be below base_tolerance ({})",
                self.extended_tolerance, self.base_tolerance
            )));
        }
        if self.max_block_size == 0 || self.overlay_step == 0 {
            return Err(ExtractError::InvalidParameter(
                "max_block_size and overlay_step must be non-zero".into(),
            ));
        }
        if !(self.smooth_low < self.smooth_high) {
            return Err(ExtractError::InvalidParameter(format!(
                "smoothing band is empty: ({}, {})",
                self.smooth_low, self.smooth_high
            )));
        }
        self.components.validate()
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            white: [255, 255, 255],
            gray: [204, 204, 204],
            base_tolerance: 18.0,
            extended_tolerance: 35.0,

            protected_min_area: 500,
            protected_elongated_area: 200,
            protected_aspect_ratio: 2.0,

            max_block_size: 6,
            block_uniformity: 0.85,
            min_opposite_neighbors: 2,

            expansion_passes: 5,

            overlay_step: 12,
            overlay_radius: 24,
            overlay_fraction: 0.30,
            overlay_min_luma: 190.0,
            overlay_max_saturation: 30,

            refine_radius: 3,
            refine_max_non_grid: 0.30,
            refine_keep_radius: 1,
            refine_keep_fraction: 0.35,

            seam_radius: 3,
            seam_search_cap: 6,
            seam_max_distance: 1,

            edge_min_grid_neighbors: 3,
            smooth_removed_weight: 0.7,
            smooth_color_weight: 0.3,
            smooth_low: 0.15,
            smooth_high: 0.85,
            feather_weight: 0.5,
            feather_min_alpha: 10,

            components: ComponentFilterConfig::strict(),
        }
    }
}

/// Parameters for both paths of [`crate::extract_design`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtractionConfig {
    pub diff: DiffMattingConfig,
    pub grid: GridConfig,
}
