//! Connected-component noise filtering shared by both extraction paths.
//!
//! Components are maximal 8-connected sets of pixels with `alpha > 0`. They
//! are labelled with an explicit stack, so memory stays bounded by the image
//! size no matter how large a single component grows.

use image::{GrayImage, Luma, Rgba};
use imageproc::distance_transform::{euclidean_squared_distance_transform, Norm};
use imageproc::morphology::dilate;
use tracing::debug;

use crate::artwork_extract::config::{ComponentFilterConfig, RestorationConfig};
use crate::artwork_extract::diff_matting::DiffMap;
use crate::artwork_extract::raster::Raster;
use crate::utils::{validate_matching_dimensions, PixelGrid};
use crate::ExtractError;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Inclusive axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Bounds {
    const fn point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub const fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub const fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// A maximal 8-connected set of non-transparent pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Row-major pixel indices
    pub pixels: Vec<usize>,
    pub bounds: Bounds,
}

impl Component {
    pub fn size(&self) -> usize {
        self.pixels.len()
    }

    /// Average thickness: pixel count over the longest bounding-box side.
    pub fn thickness(&self) -> f32 {
        let longest = self.bounds.width().max(self.bounds.height()).max(1);
        self.size() as f32 / longest as f32
    }
}

/// Labels the 8-connected components of pixels with `alpha > 0`.
///
/// Components are returned in raster order of their first pixel.
pub fn label_components(raster: &Raster) -> Vec<Component> {
    let grid = PixelGrid::new(raster.width(), raster.height());
    let alpha: Vec<bool> = raster.pixels().map(|p| p[3] > 0).collect();
    let mut visited = vec![false; grid.len()];
    let mut stack = Vec::new();
    let mut components = Vec::new();

    for start in 0..grid.len() {
        if visited[start] || !alpha[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let (sx, sy) = grid.coords(start);
        let mut bounds = Bounds::point(sx, sy);
        let mut pixels = Vec::new();

        while let Some(current) = stack.pop() {
            pixels.push(current);
            let (cx, cy) = grid.coords(current);
            bounds.include(cx, cy);

            for neighbor in grid.neighbors8(cx, cy) {
                if !visited[neighbor] && alpha[neighbor] {
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        components.push(Component { pixels, bounds });
    }

    components
}

/// Counts of what a filtering pass erased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub components: usize,
    pub thin_removed: usize,
    pub distant_removed: usize,
}

/// Connected-component filter configured by one of the named presets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentFilter {
    config: ComponentFilterConfig,
}

impl ComponentFilter {
    pub const fn new(config: ComponentFilterConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &ComponentFilterConfig {
        &self.config
    }

    /// Runs thin/small removal followed by the proximity pass (when the
    /// preset enables it).
    ///
    /// Filtering is idempotent: running it again on its own output with the
    /// same configuration changes nothing.
    pub fn filter(&self, raster: &mut Raster) -> FilterReport {
        let components = label_components(raster);
        let mut report = FilterReport {
            components: components.len(),
            ..FilterReport::default()
        };
        if components.is_empty() {
            return report;
        }

        let survivors = self.remove_thin_components(raster, components, &mut report);

        if let Some(radius) = self.config.proximity_radius {
            report.distant_removed = remove_distant_components(raster, &survivors, radius);
        }

        debug!(
            components = report.components,
            thin_removed = report.thin_removed,
            distant_removed = report.distant_removed,
            "component filter applied"
        );
        report
    }

    /// Erases components below the size threshold that are also thinner than
    /// the preset allows. Returns the survivors in their original order.
    fn remove_thin_components(
        &self,
        raster: &mut Raster,
        components: Vec<Component>,
        report: &mut FilterReport,
    ) -> Vec<Component> {
        let main_size = components.iter().map(Component::size).max().unwrap_or(0);
        let size_threshold = self.config.size_threshold(main_size);

        let (thin, survivors): (Vec<_>, Vec<_>) =
            components.into_iter().partition(|component| {
                (component.size() as f32) < size_threshold
                    && component.thickness() < self.config.thinness
            });

        report.thin_removed = thin.len();
        thin.iter().for_each(|component| erase(raster, component));
        survivors
    }
}

/// Erases every component with no pixel within `radius` of the anchor.
///
/// The anchor is the largest of `components` (the first one in raster order
/// on ties). Returns how many components were erased.
pub fn remove_distant_components(
    raster: &mut Raster,
    components: &[Component],
    radius: u32,
) -> usize {
    let Some(anchor) = largest_component(components) else {
        return 0;
    };

    let (width, height) = raster.dimensions();
    let grid = PixelGrid::new(width, height);
    let mut anchor_mask = GrayImage::new(width, height);
    for &index in &components[anchor].pixels {
        let (x, y) = grid.coords(index);
        anchor_mask.put_pixel(x, y, Luma([u8::MAX]));
    }
    let distances = euclidean_squared_distance_transform(&anchor_mask);
    let limit = f64::from(radius) * f64::from(radius);

    let mut removed = 0;
    for (position, component) in components.iter().enumerate() {
        if position == anchor {
            continue;
        }
        let near = component.pixels.iter().any(|&index| {
            let (x, y) = grid.coords(index);
            distances.get_pixel(x, y)[0] <= limit
        });
        if !near {
            erase(raster, component);
            removed += 1;
        }
    }
    removed
}

/// Index of the largest component, first in order on ties.
fn largest_component(components: &[Component]) -> Option<usize> {
    components
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (position, component)| {
            match best {
                Some((_, size)) if size >= component.size() => best,
                _ => Some((position, component.size())),
            }
        })
        .map(|(position, _)| position)
}

fn erase(raster: &mut Raster, component: &Component) {
    let width = raster.width() as usize;
    for &index in &component.pixels {
        raster.put_pixel((index % width) as u32, (index / width) as u32, TRANSPARENT);
    }
}

/// Restores pixels the matting under-estimated near true edges.
///
/// Inside the surviving mask (optionally dilated), any pixel whose alpha is
/// below the opaque floor but whose original distance exceeds half the
/// tolerance is replaced by the opaque composite color. Returns the number
/// of restored pixels.
pub fn restore_under_matted(
    raster: &mut Raster,
    composite: &Raster,
    diff_map: &DiffMap,
    tolerance: f32,
    config: &RestorationConfig,
) -> Result<usize, ExtractError> {
    validate_matching_dimensions(raster.dimensions(), composite.dimensions())?;
    validate_matching_dimensions(raster.dimensions(), diff_map.dimensions())?;

    let (width, height) = raster.dimensions();
    let mut mask = GrayImage::from_fn(width, height, |x, y| {
        Luma([if raster.get_pixel(x, y)[3] > 0 { u8::MAX } else { 0 }])
    });
    if config.dilation_radius > 0 {
        mask = dilate(&mask, Norm::LInf, config.dilation_radius);
    }

    let half_tolerance = tolerance / 2.0;
    let mut restored = 0;
    for (x, y, Luma([inside])) in mask.enumerate_pixels() {
        if *inside == 0 {
            continue;
        }
        let pixel = raster.get_pixel_mut(x, y);
        if pixel[3] < config.opaque_floor && diff_map.get(x, y) > half_tolerance {
            let Rgba([red, green, blue, _]) = *composite.get_pixel(x, y);
            *pixel = Rgba([red, green, blue, u8::MAX]);
            restored += 1;
        }
    }
    Ok(restored)
}
