//! mvtrack — robust model estimation and sub-pixel region tracking for
//! structure from motion.
//!
//! The crate is organised in layers:
//!
//! 1. **Geometry** – shared projective helpers, normalisation, degeneracy tests.
//! 2. **Multiview** – estimation kernels (homography, 2D euclidean and
//!    similarity, 3D euclidean, calibrated resection), an adaptive MLE-scored
//!    RANSAC driver and iterative closest points.
//! 3. **Raster** – float images, Gaussian and derivative filters, lazily built pyramids.
//! 4. **Tracking** – brute, gradient, hybrid and pyramid region trackers and
//!    the five-point `track_region` entry point.
//! 5. **Autotrack** – marker bookkeeping and frame-to-frame marker tracking
//!    through a reference-counted frame accessor.

pub mod autotrack;
pub mod geometry;
pub mod multiview;
pub mod raster;
pub mod tracking;

#[cfg(test)]
mod test_utils;

pub use autotrack::{
    AutoTrack, AutoTrackError, AutoTrackOptions, FrameAccessor, FrameKey, FrameTransform,
    InMemoryFrameAccessor, InputMode, Marker, MarkerSource, MarkerStatus, PixelRect, Quad,
    Region, Tracks,
};
pub use multiview::{estimate, Estimate, EstimateError, Kernel, KernelError, RansacConfig};
pub use raster::{FloatImage, ImageLevel, LazyPyramid};
pub use tracking::{
    track_region, AlignError, RegionMatch, RegionTracker, TrackRegionOptions, TrackRegionOutput,
    TrackRegionResult, TrackerMode,
};
