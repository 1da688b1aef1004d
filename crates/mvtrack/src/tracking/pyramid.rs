use super::options::AlignError;
use super::{RegionMatch, RegionTracker};
use crate::raster::{ImageLevel, LazyPyramid};

/// Coarse-to-fine wrapper: runs `inner` from the coarsest pyramid level down
/// to full resolution, doubling the estimate between levels.
pub struct PyramidRegionTracker {
    inner: Box<dyn RegionTracker + Send + Sync>,
    pub levels: usize,
    /// Levels whose smaller side drops below this are skipped.
    pub min_level_size: usize,
}

impl PyramidRegionTracker {
    pub fn new(inner: Box<dyn RegionTracker + Send + Sync>, levels: usize) -> Self {
        Self {
            inner,
            levels,
            min_level_size: 1,
        }
    }

    fn usable_levels(&self, image1: &ImageLevel, image2: &ImageLevel) -> usize {
        let side = image1
            .width()
            .min(image1.height())
            .min(image2.width())
            .min(image2.height());
        let min_side = self.min_level_size.max(1);
        let mut levels = 1;
        while levels < self.levels
            && u32::try_from(levels)
                .ok()
                .and_then(|s| side.checked_shr(s))
                .is_some_and(|coarse| coarse >= min_side)
        {
            levels += 1;
        }
        levels
    }
}

impl RegionTracker for PyramidRegionTracker {
    fn track(
        &self,
        image1: &ImageLevel,
        image2: &ImageLevel,
        x1: [f64; 2],
        x2_guess: [f64; 2],
    ) -> Result<RegionMatch, AlignError> {
        let levels = self.usable_levels(image1, image2);
        let mut pyr1 = LazyPyramid::new(image1.clone());
        let mut pyr2 = LazyPyramid::new(image2.clone());

        let coarsest = levels - 1;
        let top = 0.5f64.powi(coarsest as i32);
        let mut estimate = [x2_guess[0] * top, x2_guess[1] * top];
        let mut iterations = 0;
        let mut result = None;

        for level in (0..levels).rev() {
            let scale = 0.5f64.powi(level as i32);
            let x1_l = [x1[0] * scale, x1[1] * scale];
            let l1 = pyr1.level(level);
            let l2 = pyr2.level(level);
            let m = self
                .inner
                .track(l1, l2, x1_l, estimate)
                .map_err(|e| AlignError::Level {
                    level,
                    source: Box::new(e),
                })?;
            tracing::trace!(level, x = m.position[0], y = m.position[1], "pyramid level done");
            iterations += m.iterations;
            estimate = if level > 0 {
                [m.position[0] * 2.0, m.position[1] * 2.0]
            } else {
                m.position
            };
            result = Some(m);
        }

        let m = result.ok_or(AlignError::OutOfBounds)?;
        Ok(RegionMatch { iterations, ..m })
    }
}
