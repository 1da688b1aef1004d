use super::options::AlignError;
use super::{RegionMatch, RegionTracker};
use crate::raster::ImageLevel;

/// Coarse search followed by fine refinement seeded from it.
///
/// The refined result is kept only if it stays within
/// `max_refinement_shift` of the coarse one; otherwise the coarse result is
/// returned when its correlation is good enough.
pub struct HybridRegionTracker {
    coarse: Box<dyn RegionTracker + Send + Sync>,
    fine: Box<dyn RegionTracker + Send + Sync>,
    pub max_refinement_shift: f64,
    pub minimum_correlation: f64,
}

impl HybridRegionTracker {
    pub fn new(
        coarse: Box<dyn RegionTracker + Send + Sync>,
        fine: Box<dyn RegionTracker + Send + Sync>,
    ) -> Self {
        Self {
            coarse,
            fine,
            max_refinement_shift: 2.0,
            minimum_correlation: 0.75,
        }
    }
}

impl RegionTracker for HybridRegionTracker {
    fn track(
        &self,
        image1: &ImageLevel,
        image2: &ImageLevel,
        x1: [f64; 2],
        x2_guess: [f64; 2],
    ) -> Result<RegionMatch, AlignError> {
        let coarse = self.coarse.track(image1, image2, x1, x2_guess)?;

        let fine_err = match self.fine.track(image1, image2, x1, coarse.position) {
            Ok(fine) => {
                let dx = fine.position[0] - coarse.position[0];
                let dy = fine.position[1] - coarse.position[1];
                let shift = (dx * dx + dy * dy).sqrt();
                if shift < self.max_refinement_shift {
                    return Ok(RegionMatch {
                        iterations: coarse.iterations + fine.iterations,
                        ..fine
                    });
                }
                format!("refinement moved {:.3} px", shift)
            }
            Err(e) => e.to_string(),
        };

        tracing::debug!(
            reason = %fine_err,
            correlation = coarse.correlation,
            "fine tracker rejected, falling back to coarse result"
        );
        if coarse.correlation >= self.minimum_correlation {
            Ok(coarse)
        } else {
            Err(AlignError::LowCorrelation {
                correlation: coarse.correlation,
                minimum: self.minimum_correlation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a fixed answer regardless of input.
    struct Fixed(Result<RegionMatch, AlignError>);

    impl RegionTracker for Fixed {
        fn track(
            &self,
            _: &ImageLevel,
            _: &ImageLevel,
            _: [f64; 2],
            _: [f64; 2],
        ) -> Result<RegionMatch, AlignError> {
            self.0.clone()
        }
    }

    fn hit(x: f64, correlation: f64) -> Result<RegionMatch, AlignError> {
        Ok(RegionMatch {
            position: [x, 10.0],
            correlation,
            iterations: 1,
        })
    }

    fn run(
        coarse: Result<RegionMatch, AlignError>,
        fine: Result<RegionMatch, AlignError>,
    ) -> Result<RegionMatch, AlignError> {
        let img = crate::raster::FloatImage::new(4, 4, 1);
        let level = ImageLevel::new(&img, 0.9);
        HybridRegionTracker::new(Box::new(Fixed(coarse)), Box::new(Fixed(fine)))
            .track(&level, &level, [0.0, 0.0], [0.0, 0.0])
    }

    #[test]
    fn close_refinement_wins() {
        let m = run(hit(10.0, 0.8), hit(10.4, 0.99)).unwrap();
        assert_eq!(m.position, [10.4, 10.0]);
        assert_eq!(m.iterations, 2);
    }

    #[test]
    fn far_refinement_falls_back_to_coarse() {
        let m = run(hit(10.0, 0.8), hit(13.0, 0.99)).unwrap();
        assert_eq!(m.position, [10.0, 10.0]);
    }

    #[test]
    fn failed_refinement_with_weak_coarse_fails() {
        let err = run(hit(10.0, 0.5), Err(AlignError::NoConvergence { iterations: 3 }))
            .unwrap_err();
        assert!(matches!(err, AlignError::LowCorrelation { .. }));
    }

    #[test]
    fn coarse_failure_propagates() {
        let err = run(Err(AlignError::OutOfBounds), hit(1.0, 1.0)).unwrap_err();
        assert_eq!(err, AlignError::OutOfBounds);
    }
}
