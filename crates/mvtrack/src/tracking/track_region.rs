//! Region tracking entry point: a marker's centre plus its four corners.

use serde::{Deserialize, Serialize};

use super::brute::BruteRegionTracker;
use super::gradient::GradientRegionTracker;
use super::hybrid::HybridRegionTracker;
use super::options::{AlignError, TrackRegionOptions, TrackerMode};
use super::pyramid::PyramidRegionTracker;
use super::RegionTracker;
use crate::raster::{FloatImage, ImageLevel};

/// Index of the centre point in the five-point arrays.
pub const CENTER: usize = 4;

/// Summary of a successful `track_region` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRegionResult {
    pub mode: TrackerMode,
    /// Normalized cross-correlation of the final match.
    pub correlation: f64,
    /// Refinement iterations summed over all levels.
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRegionOutput {
    /// Four corners followed by the centre, in `image2` coordinates.
    pub points: [[f64; 2]; 5],
    pub result: TrackRegionResult,
}

fn gradient_tracker(options: &TrackRegionOptions) -> GradientRegionTracker {
    GradientRegionTracker {
        half_pattern_size: options.half_pattern_size,
        max_iterations: options.max_iterations,
        tolerance: options.tolerance,
        min_determinant: options.min_determinant,
        minimum_correlation: options.minimum_correlation,
    }
}

fn pyramid_gradient_tracker(options: &TrackRegionOptions) -> PyramidRegionTracker {
    let mut tracker =
        PyramidRegionTracker::new(Box::new(gradient_tracker(options)), options.pyramid_levels);
    tracker.min_level_size = options.pattern_size() + 2;
    tracker
}

/// Assemble the tracker stack for `options.mode`.
pub fn build_tracker(options: &TrackRegionOptions) -> Box<dyn RegionTracker + Send + Sync> {
    match options.mode {
        TrackerMode::Brute => Box::new(BruteRegionTracker {
            half_pattern_size: options.half_pattern_size,
            half_search_size: options.half_search_size,
            minimum_correlation: options.minimum_correlation,
        }),
        TrackerMode::Gradient => Box::new(pyramid_gradient_tracker(options)),
        TrackerMode::Hybrid => {
            let coarse = BruteRegionTracker {
                half_pattern_size: options.half_pattern_size,
                half_search_size: options.half_search_size,
                minimum_correlation: 0.0,
            };
            let mut hybrid = HybridRegionTracker::new(
                Box::new(coarse),
                Box::new(pyramid_gradient_tracker(options)),
            );
            hybrid.max_refinement_shift = options.max_refinement_shift;
            hybrid.minimum_correlation = options.minimum_correlation;
            Box::new(hybrid)
        }
    }
}

/// Track the centre `x1[4]` from `image1` into `image2`, starting at `x2[4]`,
/// and move the corners `x1[0..4]` by the same translation.
pub fn track_region(
    image1: &FloatImage,
    image2: &FloatImage,
    x1: &[[f64; 2]; 5],
    x2: &[[f64; 2]; 5],
    options: &TrackRegionOptions,
) -> Result<TrackRegionOutput, AlignError> {
    options.validate()?;
    let level1 = ImageLevel::new(image1, options.sigma);
    let level2 = ImageLevel::new(image2, options.sigma);
    let tracker = build_tracker(options);

    let m = tracker.track(&level1, &level2, x1[CENTER], x2[CENTER])?;
    let shift = [
        m.position[0] - x1[CENTER][0],
        m.position[1] - x1[CENTER][1],
    ];
    let mut points = [[0.0; 2]; 5];
    for (out, p) in points.iter_mut().zip(x1.iter()).take(CENTER) {
        *out = [p[0] + shift[0], p[1] + shift[1]];
    }
    points[CENTER] = m.position;

    tracing::debug!(
        mode = ?options.mode,
        dx = shift[0],
        dy = shift[1],
        correlation = m.correlation,
        iterations = m.iterations,
        "region tracked"
    );
    Ok(TrackRegionOutput {
        points,
        result: TrackRegionResult {
            mode: options.mode,
            correlation: m.correlation,
            iterations: m.iterations,
        },
    })
}
