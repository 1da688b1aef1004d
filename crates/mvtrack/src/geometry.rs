//! Small geometric and numeric helpers shared by the model kernels.
//!
//! Provides:
//! - Hartley normalization of 2D and 3D point sets.
//! - Homogeneous projection through 3×3 and 3×4 matrices.
//! - Degeneracy tests (coincident / collinear samples).
//! - Null-space extraction for homogeneous linear systems.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Vector3, Vector4};

/// Magnitude below which a homogeneous coordinate is treated as zero.
pub(crate) const HOMOGENEOUS_EPS: f64 = 1e-15;

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3×3 transform: M * [x, y, 1]^T → [u, v].
///
/// Returns NaN coordinates when the point maps to infinity.
pub fn project(m: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    let q = m * Vector3::new(p[0], p[1], 1.0);
    if q[2].abs() < HOMOGENEOUS_EPS {
        return [f64::NAN, f64::NAN];
    }
    [q[0] / q[2], q[1] / q[2]]
}

/// Project a 3D point through a 3×4 camera matrix.
///
/// Also returns the depth (third homogeneous coordinate) so callers can reject
/// points behind the camera.
pub fn project_3d(p: &Matrix3x4<f64>, x: [f64; 3]) -> ([f64; 2], f64) {
    let q = p * Vector4::new(x[0], x[1], x[2], 1.0);
    if q[2].abs() < HOMOGENEOUS_EPS {
        return ([f64::NAN, f64::NAN], q[2]);
    }
    ([q[0] / q[2], q[1] / q[2]], q[2])
}

/// Apply a 4×4 rigid/similarity transform to a 3D point.
pub fn transform_3d(m: &Matrix4<f64>, x: [f64; 3]) -> [f64; 3] {
    let q = m * Vector4::new(x[0], x[1], x[2], 1.0);
    [q[0], q[1], q[2]]
}

/// Squared distance between two 2D points.
#[inline]
pub fn distance_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Squared distance between two 3D points.
#[inline]
pub fn distance_sq_3d(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Symmetric transfer error: `|M x1 - x2|² + |M⁻¹ x2 - x1|²`.
///
/// `m_inv` is passed in so callers scoring many correspondences invert once.
pub fn symmetric_transfer_error_sq(
    m: &Matrix3<f64>,
    m_inv: &Matrix3<f64>,
    x1: [f64; 2],
    x2: [f64; 2],
) -> f64 {
    let forward = distance_sq(project(m, x1), x2);
    let backward = distance_sq(project(m_inv, x2), x1);
    let e = forward + backward;
    if e.is_finite() {
        e
    } else {
        f64::INFINITY
    }
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Compute a normalizing transform: translate centroid to origin, scale so
/// mean distance from origin is sqrt(2).
pub fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len().max(1) as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > HOMOGENEOUS_EPS {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

/// 3D counterpart of [`normalize_points`]: mean distance becomes sqrt(3).
pub fn normalize_points_3d(pts: &[[f64; 3]]) -> (Matrix4<f64>, Vec<[f64; 3]>) {
    let n = pts.len().max(1) as f64;
    let mut c = [0.0f64; 3];
    for p in pts {
        for k in 0..3 {
            c[k] += p[k];
        }
    }
    for v in &mut c {
        *v /= n;
    }

    let mean_dist: f64 = pts
        .iter()
        .map(|p| distance_sq_3d(*p, c).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > HOMOGENEOUS_EPS {
        3f64.sqrt() / mean_dist
    } else {
        1.0
    };

    #[rustfmt::skip]
    let t = Matrix4::new(
        s, 0.0, 0.0, -s * c[0],
        0.0, s, 0.0, -s * c[1],
        0.0, 0.0, s, -s * c[2],
        0.0, 0.0, 0.0, 1.0,
    );
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - c[0]), s * (p[1] - c[1]), s * (p[2] - c[2])])
        .collect();

    (t, normalized)
}

// ── Degeneracy tests ─────────────────────────────────────────────────────

/// Returns `true` when two points are closer than `eps` (absolute).
pub fn coincident(a: [f64; 2], b: [f64; 2], eps: f64) -> bool {
    distance_sq(a, b) <= eps * eps
}

/// Returns `true` if `a`, `b`, `c` are collinear up to a tolerance relative to
/// the squared length of the longest side.
pub fn collinear(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
    let scale = distance_sq(a, b).max(distance_sq(a, c)).max(distance_sq(b, c));
    if scale <= HOMOGENEOUS_EPS {
        return true;
    }
    cross.abs() <= 1e-9 * scale
}

/// Returns `true` if any three of the points are collinear.
pub fn any_three_collinear(pts: &[[f64; 2]]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if collinear(pts[i], pts[j], pts[k]) {
                    return true;
                }
            }
        }
    }
    false
}

/// 3D collinearity test for three points, relative to the longest side.
pub fn collinear_3d(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> bool {
    let u = Vector3::new(b[0] - a[0], b[1] - a[1], b[2] - a[2]);
    let v = Vector3::new(c[0] - a[0], c[1] - a[1], c[2] - a[2]);
    let scale = u.norm_squared().max(v.norm_squared());
    if scale <= HOMOGENEOUS_EPS {
        return true;
    }
    u.cross(&v).norm() <= 1e-9 * scale
}

// ── Linear algebra ───────────────────────────────────────────────────────

/// Solve `A h = 0` in the least-squares sense for unit-norm `h`.
///
/// The solution is the eigenvector of the smallest eigenvalue of `AᵀA`.
/// Also returns the null-space gap: the second smallest eigenvalue relative to
/// the largest. A gap near zero means the null space is not one-dimensional
/// and the input does not determine `h`.
pub fn smallest_eigenvector(a: &DMatrix<f64>) -> (DVector<f64>, f64) {
    let ata = a.transpose() * a;
    let n = ata.nrows();
    let eig = nalgebra::SymmetricEigen::new(ata);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[i]
            .abs()
            .partial_cmp(&eig.eigenvalues[j].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let h = eig.eigenvectors.column(order[0]).into_owned();

    let gap = if n > 1 {
        let largest = eig.eigenvalues[order[n - 1]].abs();
        if largest > 0.0 {
            eig.eigenvalues[order[1]].abs() / largest
        } else {
            0.0
        }
    } else {
        1.0
    };
    (h, gap)
}

/// Skew-symmetric cross-product matrix `[v]×`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v[2], v[1], v[2], 0.0, -v[0], -v[1], v[0], 0.0)
}

/// Closest rotation (in Frobenius norm) to a 3×3 matrix, via SVD.
///
/// Returns `None` when the SVD does not provide singular vectors.
pub fn nearest_rotation(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut d = Matrix3::identity();
        d[(2, 2)] = -1.0;
        r = u * d * v_t;
    }
    Some(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalization_has_zero_centroid_and_sqrt2_mean_distance() {
        let pts = [[10.0, 5.0], [20.0, 5.0], [20.0, 25.0], [10.0, 25.0], [15.0, 15.0]];
        let (t, norm) = normalize_points(&pts);
        let cx: f64 = norm.iter().map(|p| p[0]).sum::<f64>() / norm.len() as f64;
        let cy: f64 = norm.iter().map(|p| p[1]).sum::<f64>() / norm.len() as f64;
        assert_relative_eq!(cx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(cy, 0.0, epsilon = 1e-12);
        let mean: f64 =
            norm.iter().map(|p| (p[0] * p[0] + p[1] * p[1]).sqrt()).sum::<f64>() / 5.0;
        assert_relative_eq!(mean, std::f64::consts::SQRT_2, epsilon = 1e-12);

        let mapped = project(&t, pts[2]);
        assert_relative_eq!(mapped[0], norm[2][0], epsilon = 1e-12);
        assert_relative_eq!(mapped[1], norm[2][1], epsilon = 1e-12);
    }

    #[test]
    fn collinearity_detects_degenerate_triples() {
        assert!(collinear([0.0, 0.0], [1.0, 1.0], [3.0, 3.0]));
        assert!(!collinear([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]));
        assert!(any_three_collinear(&[
            [0.0, 0.0],
            [5.0, 1.0],
            [1.0, 0.0],
            [2.0, 0.0]
        ]));
        assert!(!any_three_collinear(&[
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0]
        ]));
        assert!(collinear_3d([0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [2.0, 4.0, 6.0]));
    }

    #[test]
    fn nearest_rotation_recovers_scaled_rotation() {
        let r = nalgebra::Rotation3::from_euler_angles(0.1, -0.4, 0.7).into_inner();
        let est = nearest_rotation(&(r * 2.5)).unwrap();
        assert_relative_eq!(est, r, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_error_is_zero_for_exact_mapping() {
        let m = Matrix3::new(1.0, 0.0, 3.0, 0.0, 1.0, -2.0, 0.0, 0.0, 1.0);
        let inv = m.try_inverse().unwrap();
        let e = symmetric_transfer_error_sq(&m, &inv, [1.0, 1.0], [4.0, -1.0]);
        assert_relative_eq!(e, 0.0, epsilon = 1e-20);
        let e = symmetric_transfer_error_sq(&m, &inv, [1.0, 1.0], [5.0, -1.0]);
        assert_relative_eq!(e, 2.0, epsilon = 1e-12);
    }
}
