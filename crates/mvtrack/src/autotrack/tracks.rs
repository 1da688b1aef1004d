use serde::{Deserialize, Serialize};

use super::marker::Marker;

/// Markers keyed by `(clip, frame, track)`; at most one per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tracks {
    markers: Vec<Marker>,
}

impl Tracks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list; later markers replace earlier ones with the same key.
    pub fn from_markers(markers: impl IntoIterator<Item = Marker>) -> Self {
        let mut tracks = Self::new();
        for m in markers {
            tracks.insert(m);
        }
        tracks
    }

    fn position(&self, clip: i32, frame: i32, track: i32) -> Option<usize> {
        self.markers
            .iter()
            .position(|m| m.clip == clip && m.frame == frame && m.track == track)
    }

    /// Insert, replacing any marker with the same key.
    pub fn insert(&mut self, marker: Marker) {
        match self.position(marker.clip, marker.frame, marker.track) {
            Some(i) => self.markers[i] = marker,
            None => self.markers.push(marker),
        }
    }

    pub fn get(&self, clip: i32, frame: i32, track: i32) -> Option<&Marker> {
        self.position(clip, frame, track).map(|i| &self.markers[i])
    }

    pub fn remove(&mut self, clip: i32, frame: i32, track: i32) -> Option<Marker> {
        self.position(clip, frame, track)
            .map(|i| self.markers.remove(i))
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn markers_in_frame(&self, clip: i32, frame: i32) -> Vec<&Marker> {
        self.markers
            .iter()
            .filter(|m| m.clip == clip && m.frame == frame)
            .collect()
    }

    /// Every marker of `track` across clips, ordered by `(clip, frame)`.
    pub fn markers_for_track(&self, track: i32) -> Vec<&Marker> {
        let mut out: Vec<&Marker> = self.markers.iter().filter(|m| m.track == track).collect();
        out.sort_by_key(|m| (m.clip, m.frame));
        out
    }

    pub fn max_clip(&self) -> Option<i32> {
        self.markers.iter().map(|m| m.clip).max()
    }

    pub fn max_frame(&self, clip: i32) -> Option<i32> {
        self.markers
            .iter()
            .filter(|m| m.clip == clip)
            .map(|m| m.frame)
            .max()
    }

    pub fn max_track(&self) -> Option<i32> {
        self.markers.iter().map(|m| m.track).max()
    }
}
