//! Exhaustive integer-offset SSD search.

use super::correlation::{normalized_cross_correlation, sample_pattern, ssd};
use super::options::AlignError;
use super::{RegionMatch, RegionTracker};
use crate::raster::ImageLevel;

/// Scores every integer centre in `image2` where the pattern fits and keeps
/// the one with the smallest SSD.
#[derive(Debug, Clone)]
pub struct BruteRegionTracker {
    pub half_pattern_size: usize,
    /// Restrict candidates to a square of this half size around the rounded
    /// guess.
    pub half_search_size: Option<usize>,
    pub minimum_correlation: f64,
}

impl BruteRegionTracker {
    pub fn new(half_pattern_size: usize) -> Self {
        Self {
            half_pattern_size,
            half_search_size: None,
            minimum_correlation: 0.0,
        }
    }

    /// Inclusive candidate range along one axis, or `None` if empty.
    fn axis_range(&self, len: usize, guess: f64) -> Option<(usize, usize)> {
        let h = self.half_pattern_size;
        if len < 2 * h + 1 {
            return None;
        }
        let (mut lo, mut hi) = (h as i64, (len - 1 - h) as i64);
        if let Some(s) = self.half_search_size {
            if !guess.is_finite() {
                return None;
            }
            let g = guess.round() as i64;
            lo = lo.max(g - s as i64);
            hi = hi.min(g + s as i64);
        }
        (lo <= hi).then_some((lo as usize, hi as usize))
    }
}

impl RegionTracker for BruteRegionTracker {
    fn track(
        &self,
        image1: &ImageLevel,
        image2: &ImageLevel,
        x1: [f64; 2],
        x2_guess: [f64; 2],
    ) -> Result<RegionMatch, AlignError> {
        let h = self.half_pattern_size;
        let pattern = sample_pattern(image1.image(), x1, h).ok_or(AlignError::OutOfBounds)?;
        let img2 = image2.image();
        let (x_lo, x_hi) = self
            .axis_range(img2.width(), x2_guess[0])
            .ok_or(AlignError::OutOfBounds)?;
        let (y_lo, y_hi) = self
            .axis_range(img2.height(), x2_guess[1])
            .ok_or(AlignError::OutOfBounds)?;

        let side = 2 * h + 1;
        let mut window = vec![0.0f32; side * side];
        let mut best: Option<(f64, usize, usize)> = None;
        for cy in y_lo..=y_hi {
            for cx in x_lo..=x_hi {
                for (row, chunk) in window.chunks_exact_mut(side).enumerate() {
                    for (col, v) in chunk.iter_mut().enumerate() {
                        *v = img2.get(cx + col - h, cy + row - h, 0);
                    }
                }
                let cost = ssd(&pattern, &window);
                if best.map_or(true, |(c, _, _)| cost < c) {
                    best = Some((cost, cx, cy));
                }
            }
        }
        let (cost, bx, by) = best.ok_or(AlignError::OutOfBounds)?;
        let position = [bx as f64, by as f64];

        let matched = sample_pattern(img2, position, h).ok_or(AlignError::OutOfBounds)?;
        let correlation = normalized_cross_correlation(&pattern, &matched);
        tracing::trace!(cost, correlation, x = bx, y = by, "brute search best match");
        if correlation < self.minimum_correlation {
            return Err(AlignError::LowCorrelation {
                correlation,
                minimum: self.minimum_correlation,
            });
        }
        Ok(RegionMatch {
            position,
            correlation,
            iterations: 0,
        })
    }
}
