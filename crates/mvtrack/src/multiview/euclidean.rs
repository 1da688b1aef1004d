//! Rigid (euclidean) transforms in 2D and 3D.
//!
//! 2D: linear similarity fit whose rotation part is forced orthonormal.
//! 3D: Kabsch alignment via SVD of the cross-covariance.

use nalgebra::{Matrix3, Matrix4, Vector3};

use super::kernel::{check_lengths, Kernel, KernelError};
use super::robust::{estimate, Estimate, EstimateError, RansacConfig};
use super::similarity::solve_similarity_params;
use crate::geometry::{
    coincident, collinear_3d, distance_sq_3d, symmetric_transfer_error_sq, transform_3d,
};

/// Relative precision used when the caller has no tighter expectation.
pub const DEFAULT_EXPECTED_PRECISION: f64 = 1e-12;

// ── 2D ───────────────────────────────────────────────────────────────────

fn euclidean_2d_unchecked(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    expected_precision: f64,
) -> Option<Matrix3<f64>> {
    let sim = solve_similarity_params(x1, x2)?;
    if !sim.is_approx(expected_precision) {
        tracing::debug!(
            expected_precision,
            "linear euclidean fit rejected: residual above precision"
        );
        return None;
    }
    let angle = sim.b.atan2(sim.a);
    let (s, c) = angle.sin_cos();

    // Translation that is optimal for the orthonormalized rotation.
    let n = x1.len() as f64;
    let (mut m1, mut m2) = ([0.0f64; 2], [0.0f64; 2]);
    for (p, q) in x1.iter().zip(x2) {
        m1[0] += p[0] / n;
        m1[1] += p[1] / n;
        m2[0] += q[0] / n;
        m2[1] += q[1] / n;
    }
    let tx = m2[0] - (c * m1[0] - s * m1[1]);
    let ty = m2[1] - (s * m1[0] + c * m1[1]);

    Some(Matrix3::new(c, -s, tx, s, c, ty, 0.0, 0.0, 1.0))
}

/// Rigid 2D transform with `x2 ≈ E x1` from ≥2 correspondences.
///
/// Returns `None` when the inputs are degenerate or the linear residual is
/// not within `expected_precision` relative to the data (so a clearly
/// non-rigid mapping is not silently forced into a rotation).
pub fn euclidean_2d_from_correspondences_linear(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    expected_precision: f64,
) -> Option<Matrix3<f64>> {
    if x1.len() != x2.len() || x1.len() < 2 {
        return None;
    }
    euclidean_2d_unchecked(x1, x2, expected_precision)
}

/// Split a rigid 2D matrix into `(translation, angle)`.
pub fn extract_euclidean_2d_coefficients(m: &Matrix3<f64>) -> ([f64; 2], f64) {
    ([m[(0, 2)], m[(1, 2)]], m[(1, 0)].atan2(m[(0, 0)]))
}

/// Robust-estimation adapter for 2D rigid transforms.
#[derive(Debug, Clone, Copy)]
pub struct Euclidean2DKernel<'a> {
    x1: &'a [[f64; 2]],
    x2: &'a [[f64; 2]],
}

impl<'a> Euclidean2DKernel<'a> {
    pub fn new(x1: &'a [[f64; 2]], x2: &'a [[f64; 2]]) -> Result<Self, KernelError> {
        check_lengths(x1.len(), x2.len())?;
        Ok(Self { x1, x2 })
    }

    fn fit(&self, indices: &[usize]) -> Option<Matrix3<f64>> {
        let a: Vec<[f64; 2]> = indices.iter().map(|&i| self.x1[i]).collect();
        let b: Vec<[f64; 2]> = indices.iter().map(|&i| self.x2[i]).collect();
        euclidean_2d_unchecked(&a, &b, f64::INFINITY)
    }
}

impl Kernel for Euclidean2DKernel<'_> {
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
        self.fit(sample)
    }

    fn fit_inliers(&self, inliers: &[usize]) -> Option<Matrix3<f64>> {
        self.fit(inliers)
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

/// Robust 2D rigid fit. `max_error` is in pixels.
pub fn euclidean_2d_robust(
    x1: &[[f64; 2]],
    x2: &[[f64; 2]],
    max_error: f64,
    config: &RansacConfig,
) -> Result<Estimate<Matrix3<f64>>, EstimateError> {
    let kernel = Euclidean2DKernel::new(x1, x2)?;
    estimate(&kernel, max_error, config)
}

// ── 3D ───────────────────────────────────────────────────────────────────

/// Kabsch fit of `(R, t)` with `x2 ≈ R x1 + t`, optionally with a uniform
/// scale (Umeyama). Returns `(R, t, s)`.
pub(crate) fn kabsch(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
    with_scale: bool,
) -> Option<(Matrix3<f64>, Vector3<f64>, f64)> {
    let n = x1.len();
    if n < 3 || x2.len() != n {
        return None;
    }
    let inv_n = 1.0 / n as f64;
    let c1 = x1
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + Vector3::from(*p))
        * inv_n;
    let c2 = x2
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + Vector3::from(*p))
        * inv_n;

    let mut cov = Matrix3::zeros();
    let mut var1 = 0.0;
    for (p, q) in x1.iter().zip(x2) {
        let a = Vector3::from(*p) - c1;
        let b = Vector3::from(*q) - c2;
        cov += b * a.transpose();
        var1 += a.norm_squared();
    }
    cov *= inv_n;
    var1 *= inv_n;
    if var1 <= 1e-24 {
        return None;
    }

    let svd = cov.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut d = Matrix3::identity();
    if (u * v_t).determinant() < 0.0 {
        d[(2, 2)] = -1.0;
    }
    let r = u * d * v_t;

    let s = if with_scale {
        let trace: f64 = (0..3).map(|k| svd.singular_values[k] * d[(k, k)]).sum();
        trace / var1
    } else {
        1.0
    };
    let t = c2 - r * c1 * s;
    if !r.iter().all(|v| v.is_finite()) || !t.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some((r, t, s))
}

fn rigid_matrix(r: &Matrix3<f64>, t: &Vector3<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(t);
    m
}

fn has_non_collinear_triple(pts: &[[f64; 3]]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if !collinear_3d(pts[i], pts[j], pts[k]) {
                    return true;
                }
            }
        }
    }
    false
}

/// Rigid 3D transform (4×4 homogeneous) with `x2 ≈ E x1` from ≥3
/// non-collinear correspondences.
pub fn euclidean_3d_from_correspondences_linear(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
) -> Option<Matrix4<f64>> {
    if x1.len() != x2.len() || x1.len() < 3 || !has_non_collinear_triple(x1) {
        return None;
    }
    let (r, t, _) = kabsch(x1, x2, false)?;
    Some(rigid_matrix(&r, &t))
}

/// Robust-estimation adapter for 3D rigid transforms.
#[derive(Debug, Clone, Copy)]
pub struct Euclidean3DKernel<'a> {
    x1: &'a [[f64; 3]],
    x2: &'a [[f64; 3]],
}

impl<'a> Euclidean3DKernel<'a> {
    pub fn new(x1: &'a [[f64; 3]], x2: &'a [[f64; 3]]) -> Result<Self, KernelError> {
        check_lengths(x1.len(), x2.len())?;
        Ok(Self { x1, x2 })
    }

    fn fit(&self, indices: &[usize]) -> Option<Matrix4<f64>> {
        let a: Vec<[f64; 3]> = indices.iter().map(|&i| self.x1[i]).collect();
        let b: Vec<[f64; 3]> = indices.iter().map(|&i| self.x2[i]).collect();
        euclidean_3d_from_correspondences_linear(&a, &b)
    }
}

impl Kernel for Euclidean3DKernel<'_> {
    type Model = Matrix4<f64>;

    fn minimal_sample_size(&self) -> usize {
        3
    }

    fn num_correspondences(&self) -> usize {
        self.x1.len()
    }

    fn fit_minimal(&self, sample: &[usize]) -> Option<Matrix4<f64>> {
        let [i, j, k] = [sample[0], sample[1], sample[2]];
        if collinear_3d(self.x2[i], self.x2[j], self.x2[k]) {
            return None;
        }
        self.fit(sample)
    }

    fn fit_inliers(&self, inliers: &[usize]) -> Option<Matrix4<f64>> {
        self.fit(inliers)
    }

    fn residual(&self, model: &Matrix4<f64>, index: usize) -> f64 {
        let Some(inv) = model.try_inverse() else {
            return f64::INFINITY;
        };
        let (p, q) = (self.x1[index], self.x2[index]);
        distance_sq_3d(transform_3d(model, p), q) + distance_sq_3d(transform_3d(&inv, q), p)
    }

    fn error_terms(&self) -> usize {
        2
    }
}

/// Robust 3D rigid fit. `max_error` is in the points' units.
pub fn euclidean_3d_robust(
    x1: &[[f64; 3]],
    x2: &[[f64; 3]],
    max_error: f64,
    config: &RansacConfig,
) -> Result<Estimate<Matrix4<f64>>, EstimateError> {
    let kernel = Euclidean3DKernel::new(x1, x2)?;
    estimate(&kernel, max_error, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::project;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn rotation_2d(angle: f64, tx: f64, ty: f64) -> Matrix3<f64> {
        let (s, c) = angle.sin_cos();
        Matrix3::new(c, -s, tx, s, c, ty, 0.0, 0.0, 1.0)
    }

    fn check_2d(x1: &[[f64; 2]], gt: &Matrix3<f64>, angle: f64, t: [f64; 2]) {
        let x2: Vec<[f64; 2]> = x1.iter().map(|p| project(gt, *p)).collect();
        let m = euclidean_2d_from_correspondences_linear(x1, &x2, DEFAULT_EXPECTED_PRECISION)
            .unwrap();
        assert_relative_eq!(m, *gt, epsilon = 1e-8);
        let (trans, a) = extract_euclidean_2d_coefficients(&m);
        assert_relative_eq!(a, angle, epsilon = 1e-8);
        assert_relative_eq!(trans[0], t[0], epsilon = 1e-8);
        assert_relative_eq!(trans[1], t[1], epsilon = 1e-8);
    }

    #[test]
    fn translation_x() {
        let x1 = [[0.0, 0.0], [1.0, 1.0], [2.0, 1.0], [3.0, 0.5]];
        check_2d(&x1, &rotation_2d(0.0, 1.0, 0.0), 0.0, [1.0, 0.0]);
    }

    #[test]
    fn translation_xy() {
        let x1 = [[0.0, 0.0], [1.0, 1.0], [2.0, 1.0]];
        check_2d(&x1, &rotation_2d(0.0, 1.0, 1.0), 0.0, [1.0, 1.0]);
    }

    #[test]
    fn rotations_with_translation() {
        let x1 = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [5.0, 3.0]];
        check_2d(&x1, &rotation_2d(FRAC_PI_4, 0.0, 0.0), FRAC_PI_4, [0.0, 0.0]);
        check_2d(&x1, &rotation_2d(-FRAC_PI_2, 0.0, 0.0), -FRAC_PI_2, [0.0, 0.0]);
        check_2d(&x1, &rotation_2d(FRAC_PI_4, -2.0, 5.0), FRAC_PI_4, [-2.0, 5.0]);
    }

    #[test]
    fn almost_euclidean_passes_with_loose_precision() {
        let x1 = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [5.0, 3.0]];
        let s = 0.995;
        let (sn, cs) = FRAC_PI_4.sin_cos();
        let gt = Matrix3::new(s * cs, -s * sn, -2.0, s * sn, s * cs, -6.0, 0.0, 0.0, 1.0);
        let x2: Vec<[f64; 2]> = x1.iter().map(|p| project(&gt, *p)).collect();
        let m = euclidean_2d_from_correspondences_linear(&x1, &x2, 1e-2).unwrap();
        assert_relative_eq!(m, gt, epsilon = 3e-2);
        let (t, angle) = extract_euclidean_2d_coefficients(&m);
        assert_relative_eq!(angle, FRAC_PI_4, epsilon = 3e-2);
        assert_relative_eq!(t[0], -2.0, epsilon = 3e-2);
        assert_relative_eq!(t[1], -6.0, epsilon = 3e-2);
    }

    #[test]
    fn non_rigid_mapping_is_rejected_at_tight_precision() {
        let x1 = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        // Anisotropic scale cannot be explained by (a, b, tx, ty).
        let x2 = [[0.0, 0.0], [3.0, 0.0], [0.0, 1.0], [3.0, 1.0]];
        assert!(euclidean_2d_from_correspondences_linear(&x1, &x2, 1e-6).is_none());
    }

    #[test]
    fn robust_2d_rejects_outliers() {
        let gt = rotation_2d(0.4, 3.0, -7.0);
        let x1: Vec<[f64; 2]> = (0..20)
            .map(|i| [(i % 5) as f64 * 10.0 + 0.3 * i as f64, (i / 5) as f64 * 12.0])
            .collect();
        let mut x2: Vec<[f64; 2]> = x1.iter().map(|p| project(&gt, *p)).collect();
        for &i in &[0usize, 7, 13, 19] {
            x2[i][0] += 25.0;
        }
        let est = euclidean_2d_robust(&x1, &x2, 0.5, &RansacConfig::default()).unwrap();
        assert_relative_eq!(est.model, gt, epsilon = 1e-8);
        assert_eq!(est.inliers.len(), 16);
        assert!(!est.inliers.contains(&7));
    }

    fn apply(m: &Matrix4<f64>, pts: &[[f64; 3]]) -> Vec<[f64; 3]> {
        pts.iter().map(|p| transform_3d(m, *p)).collect()
    }

    #[test]
    fn euclidean_3d_translation() {
        let x1 = [[0.0, 0.0, 0.0], [1.0, 5.0, 1.0], [2.0, 1.0, 7.0], [3.0, 3.0, 3.0]];
        let mut gt = Matrix4::identity();
        gt[(0, 3)] = 2.0;
        gt[(1, 3)] = -1.0;
        gt[(2, 3)] = 1.0;
        let x2 = apply(&gt, &x1);
        let m = euclidean_3d_from_correspondences_linear(&x1, &x2).unwrap();
        assert_relative_eq!(m, gt, epsilon = 1e-8);
    }

    #[test]
    fn euclidean_3d_rotation_and_translation() {
        let x1 = [[0.0, 0.0, 0.0], [1.0, 5.0, 2.0], [1.0, 2.0, 0.0], [5.0, 3.0, 1.0]];
        let r = nalgebra::Rotation3::from_euler_angles(0.45, 0.25, 0.05).into_inner();
        let gt = rigid_matrix(&r, &Vector3::new(1.0, 3.0, -2.0));
        let x2 = apply(&gt, &x1);
        let m = euclidean_3d_from_correspondences_linear(&x1, &x2).unwrap();
        assert_relative_eq!(m, gt, epsilon = 1e-8);
    }

    #[test]
    fn euclidean_3d_rejects_collinear_points() {
        let x1 = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        assert!(euclidean_3d_from_correspondences_linear(&x1, &x1).is_none());
        let kernel = Euclidean3DKernel::new(&x1, &x1).unwrap();
        assert!(kernel.fit_minimal(&[0, 1, 2]).is_none());
    }

    #[test]
    fn robust_3d_recovers_rigid_motion() {
        let r = nalgebra::Rotation3::from_euler_angles(-0.2, 0.6, 1.1).into_inner();
        let gt = rigid_matrix(&r, &Vector3::new(-4.0, 0.5, 2.0));
        let x1: Vec<[f64; 3]> = (0..24)
            .map(|i| {
                let f = i as f64;
                [f.sin() * 3.0, (f * 0.7).cos() * 2.0, f * 0.25]
            })
            .collect();
        let mut x2 = apply(&gt, &x1);
        let outliers = [1usize, 4, 10, 15, 20];
        for &i in &outliers {
            x2[i][2] += 5.0;
        }
        let est = euclidean_3d_robust(&x1, &x2, 0.05, &RansacConfig::default()).unwrap();
        assert_relative_eq!(est.model, gt, epsilon = 1e-8);
        let expected: Vec<usize> = (0..24).filter(|i| !outliers.contains(i)).collect();
        assert_eq!(est.inliers, expected);
    }
}
