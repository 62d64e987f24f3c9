//! Refinement of the checkerboard removal mask at artwork borders.
//!
//! Three passes run in order, each against a snapshot of the previous one:
//! edge protection limits erosion of the artwork, smoothing turns the hard
//! mask boundary into partial alpha, and feathering propagates one more ring
//! of half-weight alpha outwards.

use tracing::debug;

use crate::artwork_extract::config::GridConfig;
use crate::artwork_extract::grid_detector::GridPatternDetector;
use crate::artwork_extract::mask::RemovalMask;
use crate::artwork_extract::raster::Raster;

pub struct MaskRefiner<'d, 'c> {
    detector: &'d GridPatternDetector<'c>,
    config: &'c GridConfig,
}

impl<'d, 'c> MaskRefiner<'d, 'c> {
    pub const fn new(detector: &'d GridPatternDetector<'c>, config: &'c GridConfig) -> Self {
        Self { detector, config }
    }

    /// Runs edge protection, smoothing and feathering on `mask`.
    ///
    /// `composite` supplies the original alpha that partial overrides scale.
    pub fn refine(&self, mask: &mut RemovalMask, composite: &Raster) {
        let demoted = self.protect_edges(mask);
        let (smoothed, kept) = self.smooth(mask, composite);
        let feathered = self.feather(mask);
        debug!(demoted, smoothed, kept, feathered, "removal mask refined");
    }

    /// Demotes grid-colored pixels on the removal boundary unless enough of
    /// their neighbours are still removed. Returns the number demoted.
    pub fn protect_edges(&self, mask: &mut RemovalMask) -> usize {
        let grid = mask.grid();
        let removed = mask.removed_plane().to_vec();
        let mut demoted = 0;

        for index in 0..grid.len() {
            if !removed[index] || !self.detector.is_grid_colored(index) {
                continue;
            }
            let (x, y) = grid.coords(index);
            let on_ring = grid
                .neighbors8(x, y)
                .any(|n| !removed[n] || mask.is_protected(n));
            if !on_ring {
                continue;
            }
            let removed_neighbors = grid.neighbors8(x, y).filter(|&n| removed[n]).count();
            if removed_neighbors < self.config.edge_min_grid_neighbors {
                mask.set_removed(index, false);
                demoted += 1;
            }
        }
        demoted
    }

    /// Blends removal-boundary pixels into partial alpha.
    ///
    /// For a removed pixel with at least one kept, unprotected neighbour:
    ///
    /// ```text
    /// blended = w_removed · kept / neighbours + w_color · non_grid_kept / kept
    /// ```
    ///
    /// Inside the open smoothing band the pixel gets a partial alpha override;
    /// at or above the upper bound it is kept outright. Returns
    /// `(overridden, kept)` counts.
    pub fn smooth(&self, mask: &mut RemovalMask, composite: &Raster) -> (usize, usize) {
        let grid = mask.grid();
        let removed = mask.removed_plane().to_vec();
        let (mut overridden, mut kept_outright) = (0, 0);

        for (index, pixel) in composite.pixels().enumerate() {
            if !removed[index] {
                continue;
            }
            let (x, y) = grid.coords(index);

            let has_open_neighbor = grid
                .neighbors8(x, y)
                .any(|n| !removed[n] && !mask.is_protected(n));
            if !has_open_neighbor {
                continue;
            }

            let (neighbors, kept, kept_non_grid) = grid.neighbors8(x, y).fold(
                (0usize, 0usize, 0usize),
                |(neighbors, kept, non_grid), n| {
                    let is_kept = !removed[n];
                    (
                        neighbors + 1,
                        kept + usize::from(is_kept),
                        non_grid + usize::from(is_kept && !self.detector.is_grid_colored(n)),
                    )
                },
            );

            let kept_fraction = kept as f32 / neighbors as f32;
            let color_fraction = if kept > 0 {
                kept_non_grid as f32 / kept as f32
            } else {
                0.0
            };
            let blended = self.config.smooth_removed_weight * kept_fraction
                + self.config.smooth_color_weight * color_fraction;

            if blended >= self.config.smooth_high {
                mask.set_removed(index, false);
                mask.set_override(index, None);
                kept_outright += 1;
            } else if blended > self.config.smooth_low {
                let alpha = (blended * f32::from(pixel[3])).round().clamp(0.0, 255.0) as u8;
                mask.set_override(index, Some(alpha));
                overridden += 1;
            }
        }
        (overridden, kept_outright)
    }

    /// Gives removed pixels next to overridden ones half of their neighbours'
    /// average alpha, when that exceeds the feathering floor. Returns the
    /// number of feathered pixels.
    pub fn feather(&self, mask: &mut RemovalMask) -> usize {
        let grid = mask.grid();
        let overrides = mask.override_plane().to_vec();
        let mut feathered = 0;

        for index in 0..grid.len() {
            if !mask.is_removed(index) || overrides[index].is_some() {
                continue;
            }
            let (x, y) = grid.coords(index);
            let (count, sum) = grid
                .neighbors8(x, y)
                .filter_map(|n| overrides[n])
                .fold((0u32, 0u32), |(count, sum), alpha| {
                    (count + 1, sum + u32::from(alpha))
                });
            if count == 0 {
                continue;
            }

            let alpha = (sum as f32 / count as f32 * self.config.feather_weight).round();
            if alpha > f32::from(self.config.feather_min_alpha) {
                mask.set_override(index, Some(alpha.min(255.0) as u8));
                feathered += 1;
            }
        }
        feathered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{checkerboard, fill_rect};
    use crate::utils::PixelGrid;
    use image::Rgba;

    fn mask_from_rows(rows: &[&str]) -> RemovalMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let removed = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        let protected = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == 'P'))
            .collect();
        RemovalMask::from_planes(PixelGrid::new(width, height), removed, protected)
    }

    #[test]
    fn edge_protection_demotes_lonely_boundary_pixels() {
        let config = GridConfig::default();
        let composite = checkerboard(5, 3, 4, &config);
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&["#....", ".....", "....."]);

        let demoted = MaskRefiner::new(&detector, &config).protect_edges(&mut mask);

        assert_eq!(demoted, 1);
        assert_eq!(mask.removed_count(), 0);
    }

    #[test]
    fn edge_protection_keeps_well_supported_pixels() {
        let config = GridConfig::default();
        let composite = checkerboard(4, 3, 4, &config);
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&["###.", "###.", "###."]);

        MaskRefiner::new(&detector, &config).protect_edges(&mut mask);

        // (2, 0) sees only (1, 0), (1, 1), (2, 1) removed: exactly three
        assert!(mask.is_removed(mask.grid().index(2, 0)));
        assert_eq!(mask.removed_count(), 9);
    }

    #[test]
    fn smoothing_assigns_partial_alpha_on_boundary() {
        let config = GridConfig::default();
        let composite = checkerboard(6, 6, 4, &config);
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&[
            "###...", "###...", "###...", "###...", "###...", "###...",
        ]);

        MaskRefiner::new(&detector, &config).smooth(&mut mask, &composite);

        // interior column (2, 2): 3 of 8 neighbours kept, all grid-colored
        let index = mask.grid().index(2, 2);
        let expected = (0.7f32 * 3.0 / 8.0 * 255.0).round() as u8;
        assert_eq!(mask.alpha_override(index), Some(expected));
        // column 1 is not on the boundary
        assert_eq!(mask.alpha_override(mask.grid().index(1, 2)), None);
    }

    #[test]
    fn smoothing_keeps_pixels_surrounded_by_artwork() {
        let config = GridConfig::default();
        let composite = fill_rect(
            checkerboard(3, 3, 4, &config),
            0,
            0,
            3,
            3,
            Rgba([10, 120, 10, 255]),
        );
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&["...", ".#.", "..."]);

        let (_, kept) = MaskRefiner::new(&detector, &config).smooth(&mut mask, &composite);

        assert_eq!(kept, 1);
        assert_eq!(mask.removed_count(), 0);
    }

    #[test]
    fn feathering_adds_half_weight_ring() {
        let config = GridConfig::default();
        let composite = checkerboard(3, 1, 4, &config);
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&["###"]);
        mask.set_override(0, Some(100));
        mask.set_override(2, Some(10));

        let feathered = MaskRefiner::new(&detector, &config).feather(&mut mask);

        assert_eq!(feathered, 1);
        assert_eq!(mask.alpha_override(1), Some(28));
    }

    #[test]
    fn feathering_skips_faint_results() {
        let config = GridConfig::default();
        let composite = checkerboard(2, 1, 4, &config);
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&["##"]);
        mask.set_override(0, Some(20));

        assert_eq!(MaskRefiner::new(&detector, &config).feather(&mut mask), 0);
        assert_eq!(mask.alpha_override(1), None);
    }

    #[test]
    fn protected_pixels_are_never_marked() {
        let config = GridConfig::default();
        let composite = checkerboard(3, 3, 4, &config);
        let detector = GridPatternDetector::new(&composite, &config);
        let mut mask = mask_from_rows(&["###", "#P#", "###"]);

        MaskRefiner::new(&detector, &config).refine(&mut mask, &composite);

        assert!(!mask.is_removed(mask.grid().index(1, 1)));
        assert_eq!(mask.alpha_override(mask.grid().index(1, 1)), None);
    }
}
