use serde::{Deserialize, Serialize};

use super::region::Region;
use crate::geometry::collinear;

/// Four corners in fixed winding order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub corners: [[f64; 2]; 4],
}

impl Quad {
    pub fn new(corners: [[f64; 2]; 4]) -> Self {
        Self { corners }
    }

    /// Axis-aligned square of half size `half` around `center`, clockwise in
    /// image coordinates starting at the top-left corner.
    pub fn square(center: [f64; 2], half: f64) -> Self {
        let [cx, cy] = center;
        Self::new([
            [cx - half, cy - half],
            [cx + half, cy - half],
            [cx + half, cy + half],
            [cx - half, cy + half],
        ])
    }

    /// Signed shoelace area.
    pub fn signed_area(&self) -> f64 {
        let c = &self.corners;
        let mut a = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            a += c[i][0] * c[j][1] - c[j][0] * c[i][1];
        }
        0.5 * a
    }

    /// `(min, max)` corners of the bounding box.
    pub fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
        let mut lo = [f64::INFINITY; 2];
        let mut hi = [f64::NEG_INFINITY; 2];
        for p in &self.corners {
            for k in 0..2 {
                lo[k] = lo[k].min(p[k]);
                hi[k] = hi[k].max(p[k]);
            }
        }
        (lo, hi)
    }

    /// Collapsed, non-finite, or with three collinear corners.
    pub fn is_degenerate(&self) -> bool {
        let c = &self.corners;
        if c.iter().flatten().any(|v| !v.is_finite()) {
            return true;
        }
        if self.signed_area().abs() < 1e-6 {
            return true;
        }
        (0..4).any(|skip| {
            let rest: Vec<[f64; 2]> = (0..4).filter(|&i| i != skip).map(|i| c[i]).collect();
            collinear(rest[0], rest[1], rest[2])
        })
    }

    pub fn translated(&self, d: [f64; 2]) -> Self {
        let mut q = *self;
        for p in &mut q.corners {
            p[0] += d[0];
            p[1] += d[1];
        }
        q
    }
}

/// How a marker came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSource {
    Manual,
    Tracked,
    Keyframed,
}

/// Outcome of downstream outlier classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStatus {
    Unknown,
    Inlier,
    Outlier,
}

/// A tracked point and its patch in one frame of one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub clip: i32,
    pub frame: i32,
    pub track: i32,
    pub center: [f64; 2],
    pub patch: Quad,
    /// Search window relative to `center`; falls back to the tracker default.
    #[serde(default)]
    pub search_region: Option<Region>,
    pub source: MarkerSource,
    pub status: MarkerStatus,
    /// Clip/frame this marker was tracked from.
    #[serde(default)]
    pub reference_clip: Option<i32>,
    #[serde(default)]
    pub reference_frame: Option<i32>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Marker {
    /// Manually placed marker with a square patch.
    pub fn new(clip: i32, frame: i32, track: i32, center: [f64; 2], half_size: f64) -> Self {
        Self {
            clip,
            frame,
            track,
            center,
            patch: Quad::square(center, half_size),
            search_region: None,
            source: MarkerSource::Manual,
            status: MarkerStatus::Unknown,
            reference_clip: None,
            reference_frame: None,
            weight: default_weight(),
        }
    }

    /// Whether the centre is finite and inside, or within half a patch of,
    /// the patch's bounding box.
    pub fn center_is_consistent(&self) -> bool {
        if !(self.center[0].is_finite() && self.center[1].is_finite()) {
            return false;
        }
        let (lo, hi) = self.patch.bounding_box();
        let margin = 1.0 + 0.5 * (hi[0] - lo[0]).max(hi[1] - lo[1]);
        (0..2).all(|k| self.center[k] >= lo[k] - margin && self.center[k] <= hi[k] + margin)
    }

    /// Copy of this marker moved to `frame`, patch and centre unchanged.
    pub fn predicted_in(&self, frame: i32) -> Self {
        Self {
            frame,
            source: MarkerSource::Tracked,
            status: MarkerStatus::Unknown,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "marker(clip {}, frame {}, track {}, center ({:.3}, {:.3}))",
            self.clip, self.frame, self.track, self.center[0], self.center[1]
        )
    }
}
