//! Property-based tests for artwork-extract
//!
//! These tests use proptest to check the invariants of matting, cropping,
//! component filtering and checkerboard detection over generated inputs.

use artwork_extract::{
    matte_alpha, unmix_pixel, AutoCrop, ComponentFilter, ComponentFilterConfig,
    DiffMattingConfig, GridConfig, GridPatternDetector, Image, Raster,
};
use image::Rgba;
use proptest::prelude::*;

/// Strategy for generating opaque RGBA pixel values
fn opaque_pixel() -> impl Strategy<Value = Rgba<u8>> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgba([r, g, b, 255]))
}

/// Strategy for generating valid diff tolerances
fn tolerance() -> impl Strategy<Value = f32> {
    (0u8..=254).prop_map(f32::from)
}

/// Strategy for generating rectangles `(x, y, width, height)` inside a 64×64 canvas
fn rectangle() -> impl Strategy<Value = (u32, u32, u32, u32)> {
    (0u32..60, 0u32..60, 1u32..24, 1u32..24)
}

fn distance(a: Rgba<u8>, b: Rgba<u8>) -> f32 {
    (0..3)
        .map(|c| {
            let d = f32::from(a[c]) - f32::from(b[c]);
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

fn paint(rectangles: &[(u32, u32, u32, u32)]) -> Raster {
    let mut raster: Raster = Image::from_pixel(64, 64, Rgba([0, 0, 0, 0]));
    for &(x, y, width, height) in rectangles {
        for py in y..(y + height).min(64) {
            for px in x..(x + width).min(64) {
                raster.put_pixel(px, py, Rgba([40, 90, 200, 255]));
            }
        }
    }
    raster
}

proptest! {
    /// Property: pixels within the tolerance are always fully transparent
    #[test]
    fn within_tolerance_is_transparent(
        base in opaque_pixel(),
        offsets in (-40i16..=40, -40i16..=40, -40i16..=40),
        slack in 0.0f32..100.0
    ) {
        let shift = |channel: u8, offset: i16| (i16::from(channel) + offset).clamp(0, 255) as u8;
        let composite = Rgba([
            shift(base[0], offsets.0),
            shift(base[1], offsets.1),
            shift(base[2], offsets.2),
            255,
        ]);
        let d = distance(base, composite);
        let tolerance = (d.ceil() + slack).min(254.0);

        let config = DiffMattingConfig::with_tolerance(tolerance);
        prop_assert_eq!(unmix_pixel(base, composite, d, &config)[3], 0);
    }

    /// Property: opacity is within [0, 1] and never decreases with distance
    #[test]
    fn matte_alpha_is_bounded_and_monotonic(
        d in 0.0f32..442.0,
        step in 0.0f32..50.0,
        tolerance in tolerance()
    ) {
        let alpha = matte_alpha(d, tolerance);
        prop_assert!((0.0..=1.0).contains(&alpha));
        prop_assert!(matte_alpha(d + step, tolerance) >= alpha);
    }

    /// Property: at full opacity the recovered color equals the composite color
    #[test]
    fn full_alpha_reconstructs_composite(
        corners in (any::<bool>(), any::<bool>(), any::<bool>()),
        jitter in (0u8..=20, 0u8..=20),
        tolerance in tolerance()
    ) {
        // base near one RGB cube corner, composite near the opposite one
        let near = |high: bool, offset: u8| if high { 255 - offset } else { offset };
        let base = Rgba([
            near(corners.0, jitter.0),
            near(corners.1, jitter.0),
            near(corners.2, jitter.0),
            255,
        ]);
        let composite = Rgba([
            near(!corners.0, jitter.1),
            near(!corners.1, jitter.1),
            near(!corners.2, jitter.1),
            255,
        ]);
        let d = distance(base, composite);
        prop_assert!(matte_alpha(d, tolerance) >= 1.0);

        let config = DiffMattingConfig::with_tolerance(tolerance);
        prop_assert_eq!(unmix_pixel(base, composite, d, &config), composite);
    }

    /// Property: the crop is the tight bounding box of non-transparent pixels
    #[test]
    fn auto_crop_is_tight(rectangles in prop::collection::vec(rectangle(), 1..5)) {
        let raster = paint(&rectangles);
        let cropped = raster.auto_crop();
        let [x, y, width, height] = raster.content_bounds().unwrap();

        prop_assert_eq!(cropped.dimensions(), (width, height));
        prop_assert_eq!(cropped.get_pixel(0, 0), raster.get_pixel(x, y));

        let row_has_content = |row: u32| (0..width).any(|cx| cropped.get_pixel(cx, row)[3] > 0);
        let column_has_content = |column: u32| (0..height).any(|cy| cropped.get_pixel(column, cy)[3] > 0);
        prop_assert!(row_has_content(0) && row_has_content(height - 1));
        prop_assert!(column_has_content(0) && column_has_content(width - 1));
    }

    /// Property: filtering twice is the same as filtering once
    #[test]
    fn component_filter_is_idempotent(
        rectangles in prop::collection::vec(rectangle(), 1..6),
        strict in any::<bool>()
    ) {
        let config = if strict {
            ComponentFilterConfig::strict()
        } else {
            ComponentFilterConfig::permissive()
        };
        let filter = ComponentFilter::new(config);
        let mut raster = paint(&rectangles);

        filter.filter(&mut raster);
        let once = raster.clone();
        filter.filter(&mut raster);

        prop_assert_eq!(raster, once);
    }

    /// Property: a bare checkerboard is almost entirely marked for removal
    #[test]
    fn bare_checkerboard_is_detected(
        width in 12u32..40,
        height in 12u32..40,
        block in 2u32..=6
    ) {
        let config = GridConfig::default();
        let composite: Raster = Image::from_fn(width, height, |x, y| {
            let [r, g, b] = if (x / block + y / block) % 2 == 0 {
                config.white
            } else {
                config.gray
            };
            Rgba([r, g, b, 255])
        });

        let mask = GridPatternDetector::new(&composite, &config).detect();

        prop_assert!(mask.removed_fraction() >= 0.95);
    }
}
