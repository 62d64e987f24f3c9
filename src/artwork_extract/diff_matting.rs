//! Diff matting against a blank base photograph.
//!
//! When the undecorated product photo is available, the artwork is whatever
//! differs from it. For every pixel the Euclidean RGB distance `d` between
//! base and composite decides the opacity:
//!
//! ```text
//! d <= τ  →  α = 0
//! d >  τ  →  α = clamp((d - τ) / (255 - τ), 0, 1)
//! ```
//!
//! and the foreground color is recovered by inverting the compositing
//! equation `I = α·F + (1 - α)·B`:
//!
//! ```text
//! F = clamp((I - (1 - α)·B) / α, 0, 255)
//! ```
//!
//! For `α <= 0.01` the division would amplify noise, so the composite color is
//! used as is.

use image::{ImageBuffer, Rgba};
use tracing::{debug, instrument};

use crate::artwork_extract::component_filter::{restore_under_matted, ComponentFilter};
use crate::artwork_extract::config::DiffMattingConfig;
use crate::artwork_extract::raster::{resample_to, FlattenOntoWhite, Raster};
use crate::utils::{
    clamp_f32_to_primitive, color_distance, validate_matching_dimensions,
    validate_non_empty_image, PixelGrid,
};
use crate::ExtractError;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Per-pixel Euclidean RGB distance between two aligned rasters.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffMap {
    grid: PixelGrid,
    values: Vec<f32>,
}

impl DiffMap {
    /// Computes the distance map of two rasters of equal size.
    pub fn compute(base: &Raster, composite: &Raster) -> Result<Self, ExtractError> {
        validate_matching_dimensions(base.dimensions(), composite.dimensions())?;
        let (width, height) = base.dimensions();

        let values = base
            .pixels()
            .zip(composite.pixels())
            .map(|(Rgba([br, bg, bb, _]), Rgba([cr, cg, cb, _]))| {
                color_distance([*br, *bg, *bb], [*cr, *cg, *cb])
            })
            .collect();

        Ok(Self {
            grid: PixelGrid::new(width, height),
            values,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_values(width: u32, height: u32, values: Vec<f32>) -> Self {
        assert_eq!(values.len(), width as usize * height as usize);
        Self {
            grid: PixelGrid::new(width, height),
            values,
        }
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        (self.grid.width, self.grid.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[self.grid.index(x, y)]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Opacity for a given distance, in `[0, 1]`.
#[inline]
pub fn matte_alpha(distance: f32, tolerance: f32) -> f32 {
    if distance <= tolerance {
        0.0
    } else {
        ((distance - tolerance) / (255.0 - tolerance)).clamp(0.0, 1.0)
    }
}

/// Recovers one output pixel from its base and composite colors.
#[inline]
pub fn unmix_pixel(
    base: Rgba<u8>,
    composite: Rgba<u8>,
    distance: f32,
    config: &DiffMattingConfig,
) -> Rgba<u8> {
    let alpha = matte_alpha(distance, config.tolerance);
    if distance <= config.tolerance {
        return Rgba([0, 0, 0, 0]);
    }

    let Rgba([br, bg, bb, _]) = base;
    let Rgba([cr, cg, cb, _]) = composite;
    let unmix = |c: u8, b: u8| -> u8 {
        if alpha > config.min_unmix_alpha {
            let foreground = (f32::from(c) - (1.0 - alpha) * f32::from(b)) / alpha;
            clamp_f32_to_primitive(foreground.round())
        } else {
            c
        }
    };

    Rgba([
        unmix(cr, br),
        unmix(cg, bg),
        unmix(cb, bb),
        clamp_f32_to_primitive((alpha * 255.0).round()),
    ])
}

/// Extracts the artwork from `composite` by diffing it against `base`.
///
/// Both images are flattened onto white; a composite of a different size is
/// resampled to the base's dimensions. The matte is then cleaned by the
/// isolated-noise pass, the component filter and the restoration pass.
///
/// # Errors
///
/// * `ExtractError::Decode` - If either image has a zero dimension
/// * `ExtractError::InvalidParameter` - If the configuration is invalid
/// * `ExtractError::ExtractionFailure` - If the output buffer cannot be built
#[instrument(skip_all, fields(width = base.width(), height = base.height(), tolerance = config.tolerance))]
pub fn extract_with_base(
    base: &Raster,
    composite: &Raster,
    config: &DiffMattingConfig,
) -> Result<Raster, ExtractError> {
    validate_non_empty_image(base.width(), base.height(), "base image")?;
    validate_non_empty_image(composite.width(), composite.height(), "composite image")?;
    config.validate()?;

    let (width, height) = base.dimensions();
    let base = base.flatten_onto_white();
    let composite = if composite.dimensions() != (width, height) {
        debug!(
            composite_width = composite.width(),
            composite_height = composite.height(),
            "resampling composite to base dimensions"
        );
        resample_to(composite, width, height).flatten_onto_white()
    } else {
        composite.flatten_onto_white()
    };

    let diff_map = DiffMap::compute(&base, &composite)?;
    let mut matte = compute_matte(&base, &composite, &diff_map, config)?;

    if let Some(ceiling) = config.noise_alpha_ceiling {
        let cleared = remove_isolated_noise(&mut matte, ceiling);
        debug!(cleared, "isolated noise removed");
    }

    ComponentFilter::new(config.components).filter(&mut matte);

    if let Some(restoration) = &config.restoration {
        let restored =
            restore_under_matted(&mut matte, &composite, &diff_map, config.tolerance, restoration)?;
        debug!(restored, "under-matted pixels restored");
    }

    Ok(matte)
}

fn compute_matte(
    base: &Raster,
    composite: &Raster,
    diff_map: &DiffMap,
    config: &DiffMattingConfig,
) -> Result<Raster, ExtractError> {
    let (width, height) = base.dimensions();
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ExtractError::failure("diff matting", "pixel count overflows"))?;
    let mut out = vec![0u8; len];

    let base = base.as_raw();
    let composite = composite.as_raw();
    let distances = diff_map.values();

    let matte_chunk = |(index, chunk): (usize, &mut [u8])| {
        let offset = index * 4;
        let base_pixel = Rgba([
            base[offset],
            base[offset + 1],
            base[offset + 2],
            base[offset + 3],
        ]);
        let composite_pixel = Rgba([
            composite[offset],
            composite[offset + 1],
            composite[offset + 2],
            composite[offset + 3],
        ]);
        let Rgba(pixel) = unmix_pixel(base_pixel, composite_pixel, distances[index], config);
        chunk.copy_from_slice(&pixel);
    };

    #[cfg(feature = "rayon")]
    out.par_chunks_exact_mut(4).enumerate().for_each(matte_chunk);
    #[cfg(not(feature = "rayon"))]
    out.chunks_exact_mut(4).enumerate().for_each(matte_chunk);

    ImageBuffer::from_raw(width, height, out)
        .ok_or_else(|| ExtractError::failure("diff matting", "output buffer size mismatch"))
}

/// Clears faint pixels that have at most one non-transparent 8-neighbour.
///
/// Only interior pixels are examined; neighbour counts come from the matte
/// as it was before the pass. Returns the number of cleared pixels.
pub fn remove_isolated_noise(matte: &mut Raster, alpha_ceiling: u8) -> usize {
    let (width, height) = matte.dimensions();
    if width < 3 || height < 3 {
        return 0;
    }
    let grid = PixelGrid::new(width, height);
    let alpha: Vec<u8> = matte.pixels().map(|p| p[3]).collect();

    let mut cleared = 0;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let a = alpha[grid.index(x, y)];
            if a == 0 || a >= alpha_ceiling {
                continue;
            }
            let opaque_neighbors = grid.neighbors8(x, y).filter(|&n| alpha[n] > 0).count();
            if opaque_neighbors <= 1 {
                matte.put_pixel(x, y, Rgba([0, 0, 0, 0]));
                cleared += 1;
            }
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill_rect, solid_raster};

    #[test]
    fn identical_pixels_are_transparent() {
        let config = DiffMattingConfig::default();
        let pixel = Rgba([120, 80, 40, 255]);
        assert_eq!(unmix_pixel(pixel, pixel, 0.0, &config), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn distance_at_tolerance_is_transparent() {
        let config = DiffMattingConfig::default();
        let out = unmix_pixel(
            Rgba([0, 0, 0, 255]),
            Rgba([30, 0, 0, 255]),
            30.0,
            &config,
        );
        assert_eq!(out[3], 0);
    }

    #[test]
    fn full_alpha_reconstructs_composite_color() {
        let config = DiffMattingConfig::default();
        let base = Rgba([0, 0, 0, 255]);
        let composite = Rgba([255, 0, 0, 255]);
        let distance = 255.0;
        assert_eq!(matte_alpha(distance, config.tolerance), 1.0);
        assert_eq!(
            unmix_pixel(base, composite, distance, &config),
            Rgba([255, 0, 0, 255])
        );
    }

    #[test]
    fn partial_alpha_unmixes_background() {
        let config = DiffMattingConfig::with_tolerance(0.0);
        let base = Rgba([200, 200, 200, 255]);
        let composite = Rgba([100, 100, 100, 255]);
        let distance = color_distance([200, 200, 200], [100, 100, 100]);
        let out = unmix_pixel(base, composite, distance, &config);

        let alpha = distance / 255.0;
        let expected = ((100.0 - (1.0 - alpha) * 200.0) / alpha).round().clamp(0.0, 255.0) as u8;
        assert_eq!(out[0], expected);
        assert_eq!(out[3], (alpha * 255.0).round() as u8);
    }

    #[test]
    fn diff_map_requires_matching_dimensions() {
        let a = solid_raster(2, 2, [0, 0, 0]);
        let b = solid_raster(3, 2, [0, 0, 0]);
        assert!(matches!(
            DiffMap::compute(&a, &b),
            Err(ExtractError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn red_square_on_black_is_extracted() {
        let base = solid_raster(20, 20, [0, 0, 0]);
        let composite = fill_rect(base.clone(), 5, 5, 5, 5, Rgba([255, 0, 0, 255]));

        let matte = extract_with_base(&base, &composite, &DiffMattingConfig::default()).unwrap();

        for (x, y, pixel) in matte.enumerate_pixels() {
            let inside = (5..10).contains(&x) && (5..10).contains(&y);
            if inside {
                assert_eq!(pixel, &Rgba([255, 0, 0, 255]));
            } else {
                assert_eq!(pixel[3], 0);
            }
        }
    }

    #[test]
    fn composite_of_different_size_is_resampled() {
        let base = solid_raster(20, 20, [0, 0, 0]);
        let composite = solid_raster(40, 40, [0, 0, 0]);

        let matte = extract_with_base(&base, &composite, &DiffMattingConfig::default()).unwrap();

        assert_eq!(matte.dimensions(), (20, 20));
        assert!(matte.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn empty_base_is_a_decode_error() {
        let base = solid_raster(0, 10, [0, 0, 0]);
        let composite = solid_raster(10, 10, [0, 0, 0]);
        assert!(matches!(
            extract_with_base(&base, &composite, &DiffMattingConfig::default()),
            Err(ExtractError::Decode(_))
        ));
    }

    #[test]
    fn isolated_faint_pixel_is_cleared() {
        let mut matte = solid_raster(5, 5, [0, 0, 0]);
        matte.pixels_mut().for_each(|p| p[3] = 0);
        matte.put_pixel(2, 2, Rgba([9, 9, 9, 100]));
        matte.put_pixel(3, 3, Rgba([9, 9, 9, 100]));
        matte.put_pixel(0, 0, Rgba([9, 9, 9, 100]));

        let cleared = remove_isolated_noise(&mut matte, 128);

        // both interior pixels see exactly one neighbour; the border pixel is skipped
        assert_eq!(cleared, 2);
        assert_eq!(matte.get_pixel(2, 2)[3], 0);
        assert_eq!(matte.get_pixel(3, 3)[3], 0);
        assert_eq!(matte.get_pixel(0, 0)[3], 100);
    }

    #[test]
    fn strong_isolated_pixel_is_kept_by_noise_pass() {
        let mut matte = solid_raster(5, 5, [0, 0, 0]);
        matte.pixels_mut().for_each(|p| p[3] = 0);
        matte.put_pixel(2, 2, Rgba([9, 9, 9, 200]));

        assert_eq!(remove_isolated_noise(&mut matte, 128), 0);
    }
}
