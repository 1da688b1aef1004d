//! Gradient-based translational refinement (ESM-style).
//!
//! Brightness constancy is linearized with the average of the reference and
//! current gradients, which gives second-order convergence for pure
//! translation. Each step solves a 2×2 normal system.

use super::correlation::{normalized_cross_correlation, sample_pattern};
use super::options::AlignError;
use super::{RegionMatch, RegionTracker};
use crate::raster::ImageLevel;

#[derive(Debug, Clone)]
pub struct GradientRegionTracker {
    pub half_pattern_size: usize,
    pub max_iterations: usize,
    /// Stop once the update is shorter than this (pixels).
    pub tolerance: f64,
    pub min_determinant: f64,
    pub minimum_correlation: f64,
}

impl GradientRegionTracker {
    pub fn new(half_pattern_size: usize) -> Self {
        Self {
            half_pattern_size,
            max_iterations: 100,
            tolerance: 1e-3,
            min_determinant: 1e-4,
            minimum_correlation: 0.75,
        }
    }
}

impl RegionTracker for GradientRegionTracker {
    fn track(
        &self,
        image1: &ImageLevel,
        image2: &ImageLevel,
        x1: [f64; 2],
        x2_guess: [f64; 2],
    ) -> Result<RegionMatch, AlignError> {
        let h = self.half_pattern_size;
        let g1 = image1.gradients();
        let g2 = image2.gradients();

        let template = sample_pattern(&g1.blurred, x1, h).ok_or(AlignError::OutOfBounds)?;
        let t_dx = sample_pattern(&g1.dx, x1, h).ok_or(AlignError::OutOfBounds)?;
        let t_dy = sample_pattern(&g1.dy, x1, h).ok_or(AlignError::OutOfBounds)?;

        let mut x = x2_guess;
        let tol_sq = self.tolerance * self.tolerance;
        for iteration in 1..=self.max_iterations {
            let current = sample_pattern(&g2.blurred, x, h).ok_or(AlignError::OutOfBounds)?;
            let c_dx = sample_pattern(&g2.dx, x, h).ok_or(AlignError::OutOfBounds)?;
            let c_dy = sample_pattern(&g2.dy, x, h).ok_or(AlignError::OutOfBounds)?;

            let (mut a, mut b, mut c) = (0.0f64, 0.0f64, 0.0f64);
            let (mut ex, mut ey) = (0.0f64, 0.0f64);
            for k in 0..template.len() {
                let gx = 0.5 * (t_dx[k] + c_dx[k]) as f64;
                let gy = 0.5 * (t_dy[k] + c_dy[k]) as f64;
                let e = (current[k] - template[k]) as f64;
                a += gx * gx;
                b += gx * gy;
                c += gy * gy;
                ex += gx * e;
                ey += gy * e;
            }

            let determinant = a * c - b * b;
            if !(determinant >= self.min_determinant) {
                tracing::trace!(iteration, determinant, "gradient system singular");
                return Err(AlignError::SingularSystem { determinant });
            }
            // delta = -H⁻¹ g
            let dx = -(c * ex - b * ey) / determinant;
            let dy = -(a * ey - b * ex) / determinant;
            x = [x[0] + dx, x[1] + dy];

            if dx * dx + dy * dy < tol_sq {
                let matched = sample_pattern(&g2.blurred, x, h).ok_or(AlignError::OutOfBounds)?;
                let correlation = normalized_cross_correlation(&template, &matched);
                tracing::trace!(iteration, correlation, x = x[0], y = x[1], "gradient converged");
                if correlation < self.minimum_correlation {
                    return Err(AlignError::LowCorrelation {
                        correlation,
                        minimum: self.minimum_correlation,
                    });
                }
                return Ok(RegionMatch {
                    position: x,
                    correlation,
                    iterations: iteration,
                });
            }
        }
        Err(AlignError::NoConvergence {
            iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::FloatImage;
    use crate::test_utils::shifted_texture;

    #[test]
    fn identical_images_converge_at_identity() {
        let (img, _) = shifted_texture(40, 40, [0.0, 0.0]);
        let l1 = ImageLevel::new(&img, 0.9);
        let l2 = ImageLevel::new(&img, 0.9);
        let m = GradientRegionTracker::new(5)
            .track(&l1, &l2, [19.3, 20.6], [19.3, 20.6])
            .unwrap();
        assert!((m.position[0] - 19.3).abs() < 1e-6);
        assert!((m.position[1] - 20.6).abs() < 1e-6);
        assert_eq!(m.iterations, 1);
        assert!(m.correlation > 0.9999);
    }

    #[test]
    fn recovers_subpixel_shift() {
        let (img1, img2) = shifted_texture(48, 48, [1.4, -0.7]);
        let l1 = ImageLevel::new(&img1, 0.9);
        let l2 = ImageLevel::new(&img2, 0.9);
        let m = GradientRegionTracker::new(6)
            .track(&l1, &l2, [22.0, 24.0], [22.0, 24.0])
            .unwrap();
        assert!((m.position[0] - 23.4).abs() < 0.05, "{:?}", m.position);
        assert!((m.position[1] - 23.3).abs() < 0.05, "{:?}", m.position);
    }

    #[test]
    fn flat_patch_is_singular() {
        let img = FloatImage::from_fn(30, 30, |_, _| 0.5);
        let l = ImageLevel::new(&img, 0.9);
        let err = GradientRegionTracker::new(4)
            .track(&l, &l, [15.0, 15.0], [15.0, 15.0])
            .unwrap_err();
        assert!(matches!(err, AlignError::SingularSystem { .. }));
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let (img1, img2) = shifted_texture(48, 48, [1.0, 1.0]);
        let l1 = ImageLevel::new(&img1, 0.9);
        let l2 = ImageLevel::new(&img2, 0.9);
        let tracker = GradientRegionTracker {
            max_iterations: 1,
            tolerance: 1e-12,
            ..GradientRegionTracker::new(5)
        };
        let err = tracker.track(&l1, &l2, [24.0, 24.0], [24.0, 24.0]).unwrap_err();
        assert_eq!(err, AlignError::NoConvergence { iterations: 1 });
    }
}
