//! Checkerboard placeholder detection.
//!
//! Without a blank base image, the composite is assumed to show a
//! transparency checkerboard (alternating near-white and near-gray blocks,
//! at most 6px a side) wherever no artwork is present. Detection runs in
//! fixed phase order:
//!
//! 1. protected regions: large or elongated uniform runs are real content
//! 2. block detection: small uniform blocks whose cardinal neighbours
//!    alternate color
//! 3. expansion into anti-aliased block boundaries
//! 4. overlay detection beneath semi-opaque artwork
//! 5. refinement against the surrounding colors
//! 6. release of grid pixels on thin seams next to artwork
//!
//! Every phase reads a snapshot of the previous phase's mask, so the result
//! does not depend on pixel visiting order within a phase.

use std::collections::HashMap;

use image::Rgba;
use itertools::iproduct;
use tracing::{debug, instrument};

use crate::artwork_extract::component_filter::ComponentFilter;
use crate::artwork_extract::config::GridConfig;
use crate::artwork_extract::mask::{ApplyRemovalMask, RemovalMask};
use crate::artwork_extract::mask_refiner::MaskRefiner;
use crate::artwork_extract::raster::Raster;
use crate::utils::{color_distance, validate_non_empty_image, PixelGrid, NEIGHBORS_4, NEIGHBORS_8};
use crate::ExtractError;

/// The two colors of the checkerboard placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridColor {
    White,
    Gray,
}

impl GridColor {
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Gray,
            Self::Gray => Self::White,
        }
    }

    /// Classifies an RGB triple against the checkerboard colors.
    pub fn classify(rgb: [u8; 3], config: &GridConfig, tolerance: f32) -> Option<Self> {
        if color_distance(rgb, config.white) <= tolerance {
            Some(Self::White)
        } else if color_distance(rgb, config.gray) <= tolerance {
            Some(Self::Gray)
        } else {
            None
        }
    }
}

/// A confirmed checkerboard block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: GridColor,
}

/// Checkerboard lattice inferred from the confirmed blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellLattice {
    size: u32,
    origin_x: u32,
    origin_y: u32,
    white_parity: u32,
}

impl CellLattice {
    fn infer(blocks: &[Block], max_block_size: u32) -> Option<Self> {
        let size = mode(blocks.iter().map(|b| b.width.max(b.height)))?.min(max_block_size);

        let full_width = blocks.iter().filter(|b| b.width == size).map(|b| b.x % size);
        let full_height = blocks.iter().filter(|b| b.height == size).map(|b| b.y % size);
        let origin_x = mode(full_width).unwrap_or(0);
        let origin_y = mode(full_height).unwrap_or(0);

        let mut lattice = Self {
            size,
            origin_x,
            origin_y,
            white_parity: 0,
        };
        let white_parity = mode(
            blocks
                .iter()
                .filter(|b| b.color == GridColor::White)
                .map(|b| lattice.parity(b.x, b.y)),
        );
        lattice.white_parity = white_parity.unwrap_or(0);
        Some(lattice)
    }

    fn parity(&self, x: u32, y: u32) -> u32 {
        let cell_x = (x + self.size - self.origin_x) / self.size;
        let cell_y = (y + self.size - self.origin_y) / self.size;
        (cell_x + cell_y) % 2
    }

    fn expected(&self, x: u32, y: u32) -> GridColor {
        if self.parity(x, y) == self.white_parity {
            GridColor::White
        } else {
            GridColor::Gray
        }
    }
}

/// Most frequent value, preferring the larger value on ties.
fn mode(values: impl Iterator<Item = u32>) -> Option<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(value, count)| (count, value))
        .map(|(value, _)| value)
}

/// Detects the checkerboard placeholder in a composite.
pub struct GridPatternDetector<'a> {
    config: &'a GridConfig,
    grid: PixelGrid,
    rgb: Vec<[u8; 3]>,
    base_class: Vec<Option<GridColor>>,
    extended_class: Vec<Option<GridColor>>,
}

impl<'a> GridPatternDetector<'a> {
    pub fn new(raster: &Raster, config: &'a GridConfig) -> Self {
        let grid = PixelGrid::new(raster.width(), raster.height());
        let rgb: Vec<[u8; 3]> = raster
            .pixels()
            .map(|&Rgba([red, green, blue, _])| [red, green, blue])
            .collect();
        let base_class = rgb
            .iter()
            .map(|&color| GridColor::classify(color, config, config.base_tolerance))
            .collect();
        let extended_class = rgb
            .iter()
            .map(|&color| GridColor::classify(color, config, config.extended_tolerance))
            .collect();
        Self {
            config,
            grid,
            rgb,
            base_class,
            extended_class,
        }
    }

    /// Whether the pixel is grid-colored under the extended tolerance.
    #[inline]
    pub fn is_grid_colored(&self, index: usize) -> bool {
        self.extended_class[index].is_some()
    }

    /// Runs the detection phases and returns the removal mask.
    pub fn detect(&self) -> RemovalMask {
        let protected = self.protected_regions();
        let (mut grid_mask, blocks) = self.detect_blocks(&protected);

        let Some(lattice) = CellLattice::infer(&blocks, self.config.max_block_size) else {
            debug!("no checkerboard blocks found");
            return RemovalMask::from_planes(self.grid, grid_mask, protected);
        };
        debug!(blocks = blocks.len(), cell_size = lattice.size, "checkerboard blocks confirmed");

        self.expand(&mut grid_mask, &protected, &lattice);
        self.detect_overlay(&mut grid_mask, &protected);
        self.refine(&mut grid_mask, &protected);
        self.release_seams(&mut grid_mask, &protected);

        RemovalMask::from_planes(self.grid, grid_mask, protected)
    }

    /// Phase 1: marks same-color runs that are large or elongated as protected.
    ///
    /// Runs are 8-connected, except that a diagonal step is refused when both
    /// pixels it cuts across have the opposite checkerboard color. Without
    /// that rule every white block of a checkerboard would touch its diagonal
    /// neighbours at the corners and the whole pattern would form one run.
    pub fn protected_regions(&self) -> Vec<bool> {
        let grid = self.grid;
        let mut protected = vec![false; grid.len()];
        let mut visited = vec![false; grid.len()];
        let mut stack = Vec::new();

        for start in 0..grid.len() {
            let Some(color) = self.base_class[start] else {
                continue;
            };
            if visited[start] {
                continue;
            }
            visited[start] = true;
            stack.push(start);

            let mut run = Vec::new();
            let (sx, sy) = grid.coords(start);
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);

            while let Some(current) = stack.pop() {
                run.push(current);
                let (cx, cy) = grid.coords(current);
                min_x = min_x.min(cx);
                min_y = min_y.min(cy);
                max_x = max_x.max(cx);
                max_y = max_y.max(cy);

                for &(dx, dy) in &NEIGHBORS_8 {
                    let Some(neighbor) = grid.offset_index(cx, cy, dx, dy) else {
                        continue;
                    };
                    if visited[neighbor] || self.base_class[neighbor] != Some(color) {
                        continue;
                    }
                    if dx != 0 && dy != 0 && self.crosses_checker_corner(cx, cy, dx, dy, color) {
                        continue;
                    }
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }

            let width = (max_x - min_x + 1) as f32;
            let height = (max_y - min_y + 1) as f32;
            let aspect = width.max(height) / width.min(height);
            let area = run.len();
            let is_protected = area >= self.config.protected_min_area
                || (aspect > self.config.protected_aspect_ratio
                    && area >= self.config.protected_elongated_area);

            if is_protected {
                run.into_iter().for_each(|index| protected[index] = true);
            }
        }

        protected
    }

    fn crosses_checker_corner(&self, x: u32, y: u32, dx: i32, dy: i32, color: GridColor) -> bool {
        let opposite = Some(color.opposite());
        let horizontal = self.grid.offset_index(x, y, dx, 0);
        let vertical = self.grid.offset_index(x, y, 0, dy);
        matches!(
            (horizontal, vertical),
            (Some(h), Some(v)) if self.extended_class[h] == opposite && self.extended_class[v] == opposite
        )
    }

    /// Phase 2: grows candidate blocks and confirms the alternating ones.
    fn detect_blocks(&self, protected: &[bool]) -> (Vec<bool>, Vec<Block>) {
        let grid = self.grid;
        let max = self.config.max_block_size;
        let mut grid_mask = vec![false; grid.len()];
        let mut processed = vec![false; grid.len()];
        let mut blocks = Vec::new();

        for y in 0..grid.height {
            for x in 0..grid.width {
                let start = grid.index(x, y);
                if processed[start] || protected[start] {
                    continue;
                }
                processed[start] = true;
                let Some(color) = self.base_class[start] else {
                    continue;
                };

                let same = |px: u32, py: u32| -> bool {
                    let index = grid.index(px, py);
                    self.base_class[index] == Some(color) && !protected[index]
                };

                let mut width = 1;
                while width < max && x + width < grid.width && same(x + width, y) {
                    width += 1;
                }
                let mut height = 1;
                while height < max && y + height < grid.height && same(x, y + height) {
                    height += 1;
                }

                let uniform = iproduct!(y..y + height, x..x + width)
                    .filter(|&(py, px)| same(px, py))
                    .count();
                if (uniform as f32) < self.config.block_uniformity * (width * height) as f32 {
                    continue;
                }

                let block = Block {
                    x,
                    y,
                    width,
                    height,
                    color,
                };
                if self.opposite_neighbors(&block) < self.config.min_opposite_neighbors {
                    continue;
                }

                for (py, px) in iproduct!(y..y + height, x..x + width) {
                    let index = grid.index(px, py);
                    processed[index] = true;
                    if same(px, py) {
                        grid_mask[index] = true;
                    }
                }
                blocks.push(block);
            }
        }

        (grid_mask, blocks)
    }

    /// Counts cardinal samples just outside the block that carry the opposite color.
    fn opposite_neighbors(&self, block: &Block) -> usize {
        let mid_x = (block.x + block.width / 2) as i32;
        let mid_y = (block.y + block.height / 2) as i32;
        let (x, y) = (block.x as i32, block.y as i32);
        let samples = [
            (x - 1, mid_y),
            (x + block.width as i32, mid_y),
            (mid_x, y - 1),
            (mid_x, y + block.height as i32),
        ];
        let opposite = Some(block.color.opposite());

        samples
            .iter()
            .filter_map(|&(sx, sy)| self.grid.offset_index(0, 0, sx, sy))
            .filter(|&index| self.base_class[index] == opposite)
            .count()
    }

    /// Phase 3: grows the grid into adjacent extended-tolerance pixels whose
    /// color agrees with a neighbouring grid pixel or with the lattice parity.
    fn expand(&self, grid_mask: &mut [bool], protected: &[bool], lattice: &CellLattice) {
        let grid = self.grid;
        for pass in 0..self.config.expansion_passes {
            let snapshot = grid_mask.to_vec();
            let mut grown = 0;

            for index in 0..grid.len() {
                if snapshot[index] || protected[index] {
                    continue;
                }
                let Some(color) = self.extended_class[index] else {
                    continue;
                };
                let (x, y) = grid.coords(index);

                let touches_grid = NEIGHBORS_4
                    .iter()
                    .filter_map(|&(dx, dy)| grid.offset_index(x, y, dx, dy))
                    .any(|n| snapshot[n]);
                if !touches_grid {
                    continue;
                }

                let same_polarity = grid
                    .neighbors8(x, y)
                    .any(|n| snapshot[n] && self.extended_class[n] == Some(color));
                if same_polarity || lattice.expected(x, y) == color {
                    grid_mask[index] = true;
                    grown += 1;
                }
            }

            debug!(pass, grown, "grid expansion pass");
            if grown == 0 {
                break;
            }
        }
    }

    /// Phase 4: flags bright, unsaturated or grid-colored pixels that sit in a
    /// neighbourhood already dominated by the grid.
    fn detect_overlay(&self, grid_mask: &mut [bool], protected: &[bool]) {
        let grid = self.grid;
        let snapshot = grid_mask.to_vec();
        let step = self.config.overlay_step as i32;
        let radius = self.config.overlay_radius as i32;
        let offsets: Vec<(i32, i32)> = (-radius..=radius)
            .step_by(step as usize)
            .flat_map(|dy| {
                (-radius..=radius)
                    .step_by(step as usize)
                    .map(move |dx| (dx, dy))
            })
            .filter(|&offset| offset != (0, 0))
            .collect();

        let mut flagged = 0;
        for index in 0..grid.len() {
            if snapshot[index] || protected[index] || !self.is_overlay_candidate(index) {
                continue;
            }
            let (x, y) = grid.coords(index);
            let (total, hits) = offsets
                .iter()
                .filter_map(|&(dx, dy)| grid.offset_index(x, y, dx, dy))
                .fold((0usize, 0usize), |(total, hits), n| {
                    (total + 1, hits + usize::from(snapshot[n]))
                });
            if total > 0 && hits as f32 >= self.config.overlay_fraction * total as f32 {
                grid_mask[index] = true;
                flagged += 1;
            }
        }
        debug!(flagged, "overlay pixels flagged");
    }

    fn is_overlay_candidate(&self, index: usize) -> bool {
        if self.extended_class[index].is_some() {
            return true;
        }
        let [red, green, blue] = self.rgb[index];
        let luma = 0.299 * f32::from(red) + 0.587 * f32::from(green) + 0.114 * f32::from(blue);
        let saturation = red.max(green).max(blue) - red.min(green).min(blue);
        luma >= self.config.overlay_min_luma && saturation <= self.config.overlay_max_saturation
    }

    /// Phase 5: demotes grid pixels surrounded by too much non-grid color and
    /// keeps the rest only where the immediate window is mostly grid.
    fn refine(&self, grid_mask: &mut [bool], protected: &[bool]) {
        let grid = self.grid;
        let snapshot = grid_mask.to_vec();

        for index in 0..grid.len() {
            if !snapshot[index] || protected[index] {
                continue;
            }
            let (x, y) = grid.coords(index);

            let (non_grid, total) = window_count(grid, x, y, self.config.refine_radius, |n| {
                !self.is_grid_colored(n)
            });
            if non_grid as f32 > self.config.refine_max_non_grid * total as f32 {
                grid_mask[index] = false;
                continue;
            }

            let (marked, total) =
                window_count(grid, x, y, self.config.refine_keep_radius, |n| snapshot[n]);
            grid_mask[index] = marked as f32 >= self.config.refine_keep_fraction * total as f32;
        }
    }

    /// Phase 6: un-marks grid pixels that sit directly against artwork or a
    /// protected region, so thin anti-aliased seams are not cut away.
    ///
    /// Artwork here means pixels that are not grid-colored. Pixels demoted by
    /// refinement do not count, otherwise every release would widen the band
    /// that refinement already left next to the artwork.
    fn release_seams(&self, grid_mask: &mut [bool], protected: &[bool]) {
        let grid = self.grid;
        let snapshot = grid_mask.to_vec();
        let is_foreign = |index: usize| !self.is_grid_colored(index) || protected[index];

        let mut released = 0;
        for index in 0..grid.len() {
            if !snapshot[index] {
                continue;
            }
            let (x, y) = grid.coords(index);

            let (foreign, _) = window_count(grid, x, y, self.config.seam_radius, is_foreign);
            if foreign == 0 {
                continue;
            }

            let nearest = NEIGHBORS_4
                .iter()
                .filter_map(|&(dx, dy)| {
                    (1..=self.config.seam_search_cap as i32).find(|&step| {
                        grid.offset_index(x, y, dx * step, dy * step)
                            .is_some_and(is_foreign)
                    })
                })
                .min();

            if nearest.is_some_and(|distance| distance as u32 <= self.config.seam_max_distance) {
                grid_mask[index] = false;
                released += 1;
            }
        }
        debug!(released, "seam pixels released");
    }
}

/// Counts the pixels of the clipped square window around `(x, y)` that
/// satisfy `predicate`. Returns `(matching, total)`.
fn window_count(
    grid: PixelGrid,
    x: u32,
    y: u32,
    radius: u32,
    predicate: impl Fn(usize) -> bool,
) -> (usize, usize) {
    let (x0, y0, x1, y1) = grid.window(x, y, radius);
    iproduct!(y0..=y1, x0..=x1).fold((0, 0), |(matching, total), (wy, wx)| {
        (
            matching + usize::from(predicate(grid.index(wx, wy))),
            total + 1,
        )
    })
}

/// Extracts the artwork from a composite showing the checkerboard placeholder.
///
/// Runs detection, mask refinement (edge protection, smoothing and
/// feathering), applies the mask to the alpha channel and finally runs the
/// component filter with the grid preset.
///
/// # Errors
///
/// * `ExtractError::Decode` - If the composite has a zero dimension
/// * `ExtractError::InvalidParameter` - If the configuration is invalid
#[instrument(skip_all, fields(width = composite.width(), height = composite.height()))]
pub fn extract_with_grid(composite: &Raster, config: &GridConfig) -> Result<Raster, ExtractError> {
    validate_non_empty_image(composite.width(), composite.height(), "composite image")?;
    config.validate()?;

    let detector = GridPatternDetector::new(composite, config);
    let mut mask = detector.detect();
    debug!(
        removed_fraction = mask.removed_fraction(),
        "checkerboard detection finished"
    );

    MaskRefiner::new(&detector, config).refine(&mut mask, composite);

    let mut extracted = composite.clone().apply_removal_mask(&mask)?;
    ComponentFilter::new(config.components).filter(&mut extracted);
    Ok(extracted)
}
