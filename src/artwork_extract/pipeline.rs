//! End-to-end extraction: path selection, graceful fallback and auto-crop.

use tracing::{info, instrument, warn};

use crate::artwork_extract::auto_crop::AutoCrop;
use crate::artwork_extract::compositor::{place_artwork, Placement};
use crate::artwork_extract::config::ExtractionConfig;
use crate::artwork_extract::diff_matting::extract_with_base;
use crate::artwork_extract::grid_detector::extract_with_grid;
use crate::artwork_extract::raster::{ForceOpaque, Raster};
use crate::error::{ExtractError, PreviewError};
use crate::utils::validate_non_empty_image;

/// Which route produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPath {
    /// Diff matting against a blank base image
    Diff,
    /// Checkerboard placeholder removal
    Grid,
    /// Extraction failed; the composite is returned fully opaque
    Fallback,
}

/// Extracted artwork together with the route that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub raster: Raster,
    pub path: ExtractionPath,
}

/// Extracts the artwork from `composite`.
///
/// Uses diff matting when `base` is given and checkerboard removal otherwise,
/// then crops the result to its non-transparent content. Recoverable
/// failures degrade to the uncropped composite with an opaque alpha channel.
/// An unusable base is recoverable too: the composite is still there to fall
/// back to.
///
/// # Errors
///
/// * `ExtractError::Decode` - If the composite has a zero dimension
#[instrument(skip_all, fields(with_base = base.is_some()))]
pub fn extract_design(
    base: Option<&Raster>,
    composite: &Raster,
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    validate_non_empty_image(composite.width(), composite.height(), "composite image")?;

    let (result, path) = match base {
        Some(base) => (
            extract_with_base(base, composite, &config.diff),
            ExtractionPath::Diff,
        ),
        None => (
            extract_with_grid(composite, &config.grid),
            ExtractionPath::Grid,
        ),
    };

    match result {
        Ok(extracted) => {
            let raster = extracted.auto_crop();
            info!(
                ?path,
                width = raster.width(),
                height = raster.height(),
                "design extracted"
            );
            Ok(Extraction { raster, path })
        }
        // the composite is known to be valid, so a diff-path decode error is the base's
        Err(error) if error.is_recoverable() || path == ExtractionPath::Diff => {
            warn!(%error, ?path, "design extraction failed, using opaque composite");
            Ok(Extraction {
                raster: composite.clone().force_opaque(),
                path: ExtractionPath::Fallback,
            })
        }
        Err(error) => Err(error),
    }
}

/// Extracts the artwork and places it onto a product photo.
///
/// This is the full preview flow: [`extract_design`] followed by
/// [`place_artwork`] with the given placement and optional overlay layer.
///
/// # Errors
///
/// * `PreviewError::Extract` - If the composite has a zero dimension
/// * `PreviewError::Composite` - If the target is empty or the placement is
///   unusable for it
pub fn render_preview(
    base: Option<&Raster>,
    composite: &Raster,
    target: &Raster,
    placement: &Placement,
    overlay: Option<&Raster>,
    config: &ExtractionConfig,
) -> Result<Raster, PreviewError> {
    let extraction = extract_design(base, composite, config)?;
    Ok(place_artwork(&extraction.raster, target, placement, overlay)?)
}
