//! Patch alignment and coarse-to-fine region tracking.
//!
//! Provides:
//! - [`BruteRegionTracker`]: exhaustive integer SSD search.
//! - [`GradientRegionTracker`]: ESM-style sub-pixel translation refinement.
//! - [`HybridRegionTracker`]: brute search refined by a fine tracker.
//! - [`PyramidRegionTracker`]: coarse-to-fine wrapper over any tracker.
//! - [`track_region`]: five-point (corners + centre) entry point.

pub mod brute;
pub mod correlation;
pub mod gradient;
pub mod hybrid;
pub mod options;
pub mod pyramid;
pub mod track_region;

pub use brute::BruteRegionTracker;
pub use gradient::GradientRegionTracker;
pub use hybrid::HybridRegionTracker;
pub use options::{AlignError, TrackRegionOptions, TrackerMode};
pub use pyramid::PyramidRegionTracker;
pub use track_region::{build_tracker, track_region, TrackRegionOutput, TrackRegionResult};

use crate::raster::ImageLevel;

/// Where a pattern was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMatch {
    /// Pattern centre in `image2` coordinates.
    pub position: [f64; 2],
    /// Normalized cross-correlation between the pattern and the match.
    pub correlation: f64,
    /// Refinement iterations spent (0 for pure search).
    pub iterations: usize,
}

/// Locate the pattern centred at `x1` in `image1` inside `image2`, starting
/// from `x2_guess`.
pub trait RegionTracker {
    fn track(
        &self,
        image1: &ImageLevel,
        image2: &ImageLevel,
        x1: [f64; 2],
        x2_guess: [f64; 2],
    ) -> Result<RegionMatch, AlignError>;
}
