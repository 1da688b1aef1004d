//! Marker tracking across frames of a clip.
//!
//! [`AutoTrack`] fetches the search regions of a reference marker and a
//! predicted marker from a [`FrameAccessor`], aligns them with
//! [`crate::tracking::track_region`] and writes the result back into the
//! predicted marker.

pub mod auto_track;
pub mod frame_accessor;
pub mod marker;
pub mod region;
pub mod tracks;

pub use auto_track::{AutoTrack, AutoTrackError, AutoTrackOptions};
pub use frame_accessor::{FrameAccessor, FrameKey, FrameTransform, InMemoryFrameAccessor, InputMode};
pub use marker::{Marker, MarkerSource, MarkerStatus, Quad};
pub use region::{PixelRect, Region};
pub use tracks::Tracks;
