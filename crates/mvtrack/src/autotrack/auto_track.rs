//! Marker tracking between frames: region fetch, alignment, write-back.

use serde::{Deserialize, Serialize};

use super::frame_accessor::{FrameAccessor, FrameKey, InputMode};
use super::marker::{Marker, MarkerSource, MarkerStatus};
use super::region::Region;
use super::tracks::Tracks;
use crate::raster::FloatImage;
use crate::tracking::track_region::CENTER;
use crate::tracking::{track_region, AlignError, TrackRegionOptions, TrackRegionResult};

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AutoTrackError {
    /// The reference marker's patch has collapsed.
    DegenerateQuad { track: i32 },
    /// A centre is non-finite or far from its patch.
    InvalidMarker { clip: i32, frame: i32, track: i32 },
    /// The frame accessor could not supply a marker's search region.
    FrameUnavailable { clip: i32, frame: i32 },
    /// No marker with this key in the store.
    MissingMarker { clip: i32, frame: i32, track: i32 },
    Alignment(AlignError),
}

impl std::fmt::Display for AutoTrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateQuad { track } => {
                write!(f, "degenerate reference patch on track {}", track)
            }
            Self::InvalidMarker { clip, frame, track } => write!(
                f,
                "marker (clip {}, frame {}, track {}) has an invalid centre",
                clip, frame, track
            ),
            Self::FrameUnavailable { clip, frame } => {
                write!(f, "frame {} of clip {} is unavailable", frame, clip)
            }
            Self::MissingMarker { clip, frame, track } => write!(
                f,
                "no marker for clip {}, frame {}, track {}",
                clip, frame, track
            ),
            Self::Alignment(e) => write!(f, "alignment failed: {}", e),
        }
    }
}

impl std::error::Error for AutoTrackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Alignment(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AlignError> for AutoTrackError {
    fn from(e: AlignError) -> Self {
        Self::Alignment(e)
    }
}

// ── Options ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTrackOptions {
    /// Search window relative to a marker's centre, used when the marker
    /// carries none.
    pub search_region: Region,
    pub track_region: TrackRegionOptions,
}

impl Default for AutoTrackOptions {
    fn default() -> Self {
        Self {
            search_region: Region::square(31.0),
            track_region: TrackRegionOptions::default(),
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────

/// Image held from a [`FrameAccessor`]; released on drop.
struct HeldImage<'a, A: FrameAccessor + ?Sized> {
    accessor: &'a A,
    key: FrameKey,
    image: FloatImage,
}

impl<A: FrameAccessor + ?Sized> Drop for HeldImage<'_, A> {
    fn drop(&mut self) {
        self.accessor.release_image(self.key);
    }
}

/// Marker patch and centre relative to the integer origin of its search
/// region. Returns `(origin, [corners..., centre])`.
fn marker_to_arrays(marker: &Marker, region: &Region) -> ([f64; 2], [[f64; 2]; 5]) {
    let origin = [
        (marker.center[0] + region.min[0]).floor(),
        (marker.center[1] + region.min[1]).floor(),
    ];
    let mut points = [[0.0; 2]; 5];
    for (out, c) in points.iter_mut().zip(&marker.patch.corners) {
        *out = [c[0] - origin[0], c[1] - origin[1]];
    }
    points[CENTER] = [marker.center[0] - origin[0], marker.center[1] - origin[1]];
    (origin, points)
}

/// Half pattern size covering the reference patch.
fn half_pattern_from_patch(marker: &Marker) -> usize {
    let (lo, hi) = marker.patch.bounding_box();
    let extent = (hi[0] - lo[0]).max(hi[1] - lo[1]);
    (0.5 * extent).round().max(1.0) as usize
}

/// Tracks markers frame to frame and keeps the resulting [`Tracks`].
pub struct AutoTrack<A: FrameAccessor> {
    accessor: A,
    tracks: Tracks,
    pub options: AutoTrackOptions,
}

impl<A: FrameAccessor> AutoTrack<A> {
    pub fn new(accessor: A) -> Self {
        Self::with_options(accessor, AutoTrackOptions::default())
    }

    pub fn with_options(accessor: A, options: AutoTrackOptions) -> Self {
        Self {
            accessor,
            tracks: Tracks::new(),
            options,
        }
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    pub fn add_marker(&mut self, marker: Marker) {
        self.tracks.insert(marker);
    }

    pub fn get_marker(&self, clip: i32, frame: i32, track: i32) -> Option<&Marker> {
        self.tracks.get(clip, frame, track)
    }

    /// Replace the whole store.
    pub fn set_markers(&mut self, markers: Vec<Marker>) {
        self.tracks = Tracks::from_markers(markers);
    }

    pub fn markers(&self) -> &[Marker] {
        self.tracks.markers()
    }

    fn fetch(&self, marker: &Marker, region: &Region) -> Result<HeldImage<'_, A>, AutoTrackError> {
        let rect = region.offset(marker.center).to_pixel_rect();
        match self
            .accessor
            .get_image(marker.clip, marker.frame, InputMode::Mono, Some(&rect), None)
        {
            Some((key, image)) => Ok(HeldImage {
                accessor: &self.accessor,
                key,
                image,
            }),
            None => {
                tracing::warn!(
                    clip = marker.clip,
                    frame = marker.frame,
                    track = marker.track,
                    ?rect,
                    "could not fetch search region"
                );
                Err(AutoTrackError::FrameUnavailable {
                    clip: marker.clip,
                    frame: marker.frame,
                })
            }
        }
    }

    /// Track `reference` into the frame of `tracked`, using `tracked`'s
    /// current centre and patch as the prediction.
    ///
    /// On success `tracked` receives the new patch and centre, source
    /// `Tracked`, status `Unknown` and the reference's clip/frame. On failure
    /// it is left untouched.
    pub fn track_marker_to_frame(
        &self,
        reference: &Marker,
        tracked: &mut Marker,
    ) -> Result<TrackRegionResult, AutoTrackError> {
        if reference.patch.is_degenerate() {
            return Err(AutoTrackError::DegenerateQuad {
                track: reference.track,
            });
        }
        for m in [reference, &*tracked] {
            if !m.center_is_consistent() {
                return Err(AutoTrackError::InvalidMarker {
                    clip: m.clip,
                    frame: m.frame,
                    track: m.track,
                });
            }
        }

        let region1 = reference
            .search_region
            .unwrap_or(self.options.search_region);
        let region2 = tracked.search_region.unwrap_or(self.options.search_region);
        let (_, x1) = marker_to_arrays(reference, &region1);
        let (origin2, x2) = marker_to_arrays(tracked, &region2);

        let image1 = self.fetch(reference, &region1)?;
        let image2 = self.fetch(tracked, &region2)?;

        let mut options = self.options.track_region.clone();
        options.half_pattern_size = half_pattern_from_patch(reference);
        let out = track_region(&image1.image, &image2.image, &x1, &x2, &options)?;

        let to_frame = |p: [f64; 2]| [p[0] + origin2[0], p[1] + origin2[1]];
        for (corner, p) in tracked.patch.corners.iter_mut().zip(&out.points) {
            *corner = to_frame(*p);
        }
        tracked.center = to_frame(out.points[CENTER]);
        tracked.source = MarkerSource::Tracked;
        tracked.status = MarkerStatus::Unknown;
        tracked.reference_clip = Some(reference.clip);
        tracked.reference_frame = Some(reference.frame);

        tracing::debug!(
            track = reference.track,
            from = reference.frame,
            to = tracked.frame,
            x = tracked.center[0],
            y = tracked.center[1],
            correlation = out.result.correlation,
            "marker tracked"
        );
        Ok(out.result)
    }

    /// Track the stored marker `(clip, frame_from, track)` into `frame_to`
    /// and store the result.
    ///
    /// The prediction is the stored marker at `frame_to` if there is one,
    /// otherwise the reference itself.
    pub fn track_marker(
        &mut self,
        clip: i32,
        frame_from: i32,
        frame_to: i32,
        track: i32,
    ) -> Result<Marker, AutoTrackError> {
        let reference = self
            .tracks
            .get(clip, frame_from, track)
            .cloned()
            .ok_or(AutoTrackError::MissingMarker {
                clip,
                frame: frame_from,
                track,
            })?;
        let mut tracked = self
            .tracks
            .get(clip, frame_to, track)
            .cloned()
            .unwrap_or_else(|| reference.predicted_in(frame_to));
        self.track_marker_to_frame(&reference, &mut tracked)?;
        self.tracks.insert(tracked.clone());
        Ok(tracked)
    }
}
