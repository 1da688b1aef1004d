//! 2D homography estimation via normalized DLT.
//!
//! Provides:
//! - Linear (non-robust) DLT from ≥4 correspondences.
//! - [`HomographyKernel`] for the robust estimator (4-point minimal sample,
//!   symmetric transfer error).
//! - Robust convenience entry points.

use nalgebra::{DMatrix, Matrix3};

use super::kernel::{check_lengths, Kernel, KernelError};
use super::robust::{estimate, Estimate, EstimateError, RansacConfig};
use crate::geometry::{
    any_three_collinear, normalize_points, smallest_eigenvector, symmetric_transfer_error_sq,
    HOMOGENEOUS_EPS,
};

/// Solve the normalized DLT. Returns `None` for rank-deficient systems.
fn dlt(x1: &[[f64; 2]], x2: &[[f64; 2]]) -> Option<Matrix3<f64>> {
    let n = x1.len();
    let (t1, p1) = normalize_points(x1);
    let (t2, p2) = normalize_points(x2);

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (p1[i][0], p1[i][1]);
        let (dx, dy) = (p2[i][0], p2[i][1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    let (h, _) = smallest_eigenvector(&a);

    #[rustfmt::skip]
    let h_norm = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], h[8],
    );

    let t2_inv = t2.try_inverse()?;
    let mut m = t2_inv * h_norm * t1;
    let scale = m[(2, 2)];
    if scale.abs() > HOMOGENEOUS_EPS {
        m /= scale;
    } else {
        m /= m.norm();
    }

    if !m.iter().all(|v| v.is_finite()) || m.determinant().abs() < HOMOGENEOUS_EPS {
        return None;
    }
    Some(m)
}

/// Estimate a homography `H` with `x2 ≈ H x1` from ≥4 correspondences.
pub fn homography_2d_from_correspondences_linear(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
) -> Result<Matrix3<f64>, KernelError> {
    check_lengths(x1.len(), x2.len())?;
    if x1.len() < 4 {
        return Err(KernelError::TooFewPoints {
            needed: 4,
            got: x1.len(),
        });
    }
    if x1.len() == 4 && (any_three_collinear(x1) || any_three_collinear(x2)) {
        return Err(KernelError::Degenerate);
    }
    dlt(x1, x2).ok_or(KernelError::Degenerate)
}

/// Robust-estimation adapter for 2D homographies.
#[derive(Debug, Clone, Copy)]
pub struct HomographyKernel<'a> {
    x1: &'a [[f64; 2]],
    x2: &'a [[f64; 2]],
}

impl<'a> HomographyKernel<'a> {
    pub fn new(x1: &'a [[f64; 2]], x2: &'a [[f64; 2]]) -> Result<Self, KernelError> {
        check_lengths(x1.len(), x2.len())?;
        Ok(Self { x1, x2 })
    }

    fn gather(&self, indices: &[usize]) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        (
            indices.iter().map(|&i| self.x1[i]).collect(),
            indices.iter().map(|&i| self.x2[i]).collect(),
        )
    }
}

impl Kernel for HomographyKernel<'_> {
    type Model = Matrix3<f64>;

    fn minimal_sample_size(&self) -> usize {
        4
    }

    fn num_correspondences(&self) -> usize {
        self.x1.len()
    }

    fn fit_minimal(&self, sample: &[usize]) -> Option<Matrix3<f64>> {
        let (a, b) = self.gather(sample);
        if any_three_collinear(&a) || any_three_collinear(&b) {
            return None;
        }
        dlt(&a, &b)
    }

    fn fit_inliers(&self, inliers: &[usize]) -> Option<Matrix3<f64>> {
        if inliers.len() < 4 {
            return None;
        }
        let (a, b) = self.gather(inliers);
        dlt(&a, &b)
    }

    fn residual(&self, model: &Matrix3<f64>, index: usize) -> f64 {
        let Some(inv) = model.try_inverse() else {
            return f64::INFINITY;
        };
        symmetric_transfer_error_sq(model, &inv, self.x1[index], self.x2[index])
    }

    fn error_terms(&self) -> usize {
        2
    }
}

/// Robust homography fit. `max_error` is in pixels.
pub fn homography_2d_robust(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    max_error: f64,
    config: &RansacConfig,
) -> Result<Estimate<Matrix3<f64>>, EstimateError> {
    let kernel = HomographyKernel::new(x1, x2)?;
    estimate(&kernel, max_error, config)
}

/// Robust homography fit returning `(H, inliers, error)` where `error` is
/// `sqrt(score / 2)` of the best sampled model.
pub fn homography_2d_from_correspondences_4point_robust(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    max_error: f64,
    config: &RansacConfig,
) -> Result<(Matrix3<f64>, Vec<usize>, f64), EstimateError> {
    let est = homography_2d_robust(x1, x2, max_error, config)?;
    let error = (est.score / 2.0).sqrt();
    Ok((est.model, est.inliers, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::project;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    fn make_test_homography() -> Matrix3<f64> {
        Matrix3::new(1.2, 0.1, 5.0, -0.05, 0.9, 10.0, 1e-4, 2e-4, 1.0)
    }

    fn random_points(n: usize, seed: u64) -> Vec<[f64; 2]> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| [rng.gen_range(0.0..200.0), rng.gen_range(0.0..200.0)])
            .collect()
    }

    #[test]
    fn linear_recovers_exact_homography() {
        let h = make_test_homography();
        let x1 = random_points(10, 1);
        let x2: Vec<[f64; 2]> = x1.iter().map(|p| project(&h, *p)).collect();
        let est = homography_2d_from_correspondences_linear(&x1, &x2).unwrap();
        assert_relative_eq!(est, h, epsilon = 1e-9, max_relative = 1e-8);
    }

    #[test]
    fn linear_rejects_malformed_input() {
        let x = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert_eq!(
            homography_2d_from_correspondences_linear(&x, &x),
            Err(KernelError::TooFewPoints { needed: 4, got: 3 })
        );
        let y = [[0.0, 0.0]];
        assert!(matches!(
            homography_2d_from_correspondences_linear(&x, &y),
            Err(KernelError::LengthMismatch { left: 3, right: 1 })
        ));
        let line = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [0.0, 5.0]];
        assert_eq!(
            homography_2d_from_correspondences_linear(&line, &line),
            Err(KernelError::Degenerate)
        );
    }

    #[test]
    fn minimal_fit_rejects_collinear_samples() {
        let x1 = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0]];
        let x2 = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0]];
        let kernel = HomographyKernel::new(&x1, &x2).unwrap();
        assert!(kernel.fit_minimal(&[0, 1, 2, 3]).is_none());
    }

    #[test]
    fn robust_recovers_model_with_outliers() {
        let h = make_test_homography();
        let n = 40;
        let x1 = random_points(n, 2);
        let mut x2: Vec<[f64; 2]> = x1.iter().map(|p| project(&h, *p)).collect();

        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let outliers: Vec<usize> = (0..n).filter(|i| i % 10 < 3).collect();
        for &i in &outliers {
            let sx = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            x2[i][0] += sx * rng.gen_range(20.0..60.0);
            x2[i][1] += rng.gen_range(20.0..60.0);
        }

        let est = homography_2d_robust(&x1, &x2, 0.5, &RansacConfig::default()).unwrap();
        assert_relative_eq!(est.model, h, epsilon = 1e-8, max_relative = 1e-6);
        let expected: Vec<usize> = (0..n).filter(|i| !outliers.contains(i)).collect();
        assert_eq!(est.inliers, expected);

        // Refitting on the returned inliers reproduces the model.
        let kernel = HomographyKernel::new(&x1, &x2).unwrap();
        let refit = kernel.fit_inliers(&est.inliers).unwrap();
        assert_relative_eq!(refit, est.model, epsilon = 1e-12);
    }

    #[test]
    fn four_point_robust_reports_small_error_on_clean_data() {
        let h = make_test_homography();
        let x1 = random_points(20, 4);
        let x2: Vec<[f64; 2]> = x1.iter().map(|p| project(&h, *p)).collect();
        let (est, inliers, err) =
            homography_2d_from_correspondences_4point_robust(&x1, &x2, 1.0, &RansacConfig::default())
                .unwrap();
        assert_eq!(inliers.len(), 20);
        assert!(err < 1e-6);
        assert_relative_eq!(est, h, epsilon = 1e-8, max_relative = 1e-6);
    }

    #[test]
    fn robust_fails_on_too_few_correspondences() {
        let x = random_points(3, 5);
        let err = homography_2d_robust(&x, &x, 1.0, &RansacConfig::default()).unwrap_err();
        assert_eq!(err, EstimateError::TooFewCorrespondences { needed: 4, got: 3 });
    }
}
