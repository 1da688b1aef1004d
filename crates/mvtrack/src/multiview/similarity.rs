//! 2D similarity transforms (rotation, uniform scale, translation).
//!
//! The model is `[[a, -b, tx], [b, a, ty], [0, 0, 1]]`, solved linearly from
//! two or more correspondences. The same linear system backs the 2D euclidean
//! fit in [`super::euclidean`].

use nalgebra::{DMatrix, DVector, Matrix3};

use super::kernel::{check_lengths, Kernel, KernelError};
use super::robust::{estimate, Estimate, EstimateError, RansacConfig};
use crate::geometry::{coincident, symmetric_transfer_error_sq, HOMOGENEOUS_EPS};

/// Linear least-squares solution for `(a, b, tx, ty)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinearSimilarity {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
    /// `|A p - y|`
    residual_norm: f64,
    /// `|A p|`
    fitted_norm: f64,
    /// `|y|`
    target_norm: f64,
}

impl LinearSimilarity {
    /// Relative fit check: `|A p - y| <= precision * min(|A p|, |y|)`.
    pub fn is_approx(&self, precision: f64) -> bool {
        self.residual_norm <= precision * self.fitted_norm.min(self.target_norm)
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.a, -self.b, self.tx, self.b, self.a, self.ty, 0.0, 0.0, 1.0)
    }
}

/// Solve `x2 = [a -b; b a] x1 + t` in the least-squares sense.
///
/// Returns `None` when the system is rank deficient (all points coincident).
pub(crate) fn solve_similarity_params(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
) -> Option<LinearSimilarity> {
    let n = x1.len();
    if n < 2 || x2.len() != n {
        return None;
    }
    let mut a = DMatrix::zeros(2 * n, 4);
    let mut y = DVector::zeros(2 * n);
    for i in 0..n {
        let [px, py] = x1[i];
        a[(2 * i, 0)] = px;
        a[(2 * i, 1)] = -py;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i + 1, 0)] = py;
        a[(2 * i + 1, 1)] = px;
        a[(2 * i + 1, 3)] = 1.0;
        y[2 * i] = x2[i][0];
        y[2 * i + 1] = x2[i][1];
    }

    let svd = a.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let min_sv = svd.singular_values.min();
    if max_sv <= HOMOGENEOUS_EPS || min_sv <= 1e-12 * max_sv {
        return None;
    }
    let p = svd.solve(&y, 1e-12 * max_sv).ok()?;
    let fitted = &a * &p;

    Some(LinearSimilarity {
        a: p[0],
        b: p[1],
        tx: p[2],
        ty: p[3],
        residual_norm: (&fitted - &y).norm(),
        fitted_norm: fitted.norm(),
        target_norm: y.norm(),
    })
}

/// Least-squares similarity with `x2 ≈ S x1` from ≥2 correspondences.
pub fn similarity_2d_from_correspondences_linear(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
) -> Option<Matrix3<f64>> {
    solve_similarity_params(x1, x2).map(|s| s.matrix())
}

/// Split a similarity matrix into `(translation, angle, scale)`.
pub fn extract_similarity_2d_coefficients(m: &Matrix3<f64>) -> ([f64; 2], f64, f64) {
    let translation = [m[(0, 2)], m[(1, 2)]];
    let angle = m[(1, 0)].atan2(m[(0, 0)]);
    let scale = m[(0, 0)].hypot(m[(1, 0)]);
    (translation, angle, scale)
}

/// Robust-estimation adapter for 2D similarities.
#[derive(Debug, Clone, Copy)]
pub struct Similarity2DKernel<'a> {
    x1: &'a [[f64; 2]],
    x2: &'a [[f64; 2]],
}

impl<'a> Similarity2DKernel<'a> {
    pub fn new(x1: &'a [[f64; 2]], x2: &'a [[f64; 2]]) -> Result<Self, KernelError> {
        check_lengths(x1.len(), x2.len())?;
        Ok(Self { x1, x2 })
    }
}

impl Kernel for Similarity2DKernel<'_> {
    type Model = Matrix3<f64>;

    fn minimal_sample_size(&self) -> usize {
        2
    }

    fn num_correspondences(&self) -> usize {
        self.x1.len()
    }

    fn fit_minimal(&self, sample: &[usize]) -> Option<Matrix3<f64>> {
        let (i, j) = (sample[0], sample[1]);
        if coincident(self.x1[i], self.x1[j], 1e-12) || coincident(self.x2[i], self.x2[j], 1e-12)
        {
            return None;
        }
        self.fit_inliers(sample)
    }

    fn fit_inliers(&self, inliers: &[usize]) -> Option<Matrix3<f64>> {
        let a: Vec<[f64; 2]> = inliers.iter().map(|&i| self.x1[i]).collect();
        let b: Vec<[f64; 2]> = inliers.iter().map(|&i| self.x2[i]).collect();
        similarity_2d_from_correspondences_linear(&a, &b)
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

/// Robust similarity fit. `max_error` is in pixels.
pub fn similarity_2d_robust(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    max_error: f64,
    config: &RansacConfig,
) -> Result<Estimate<Matrix3<f64>>, EstimateError> {
    let kernel = Similarity2DKernel::new(x1, x2)?;
    estimate(&kernel, max_error, config)
}
