//! Euclidean resection: camera pose `[R|t]` from known 3D points and their
//! images under known intrinsics.
//!
//! The linear step is a Hartley-normalized DLT on calibrated (normalized
//! camera) coordinates, projected onto a proper rotation. Refits add a
//! Gauss-Newton pass over the rotation (axis-angle increment) and translation.

use nalgebra::{
    DMatrix, Matrix2x3, Matrix3, Matrix3x4, Matrix3x6, Matrix6, Rotation3, Vector2, Vector3,
    Vector4, Vector6,
};

use super::kernel::{check_lengths, Kernel, KernelError};
use super::robust::{estimate, Estimate, EstimateError, RansacConfig};
use crate::geometry::{
    distance_sq, normalize_points, normalize_points_3d, project, skew, smallest_eigenvector,
};

/// Null-space gap below which the DLT system is treated as rank deficient
/// (for example coplanar points).
const DEGENERATE_GAP: f64 = 1e-10;
const MAX_REFINE_ITERATIONS: usize = 20;
const MIN_DEPTH: f64 = 1e-12;

fn compose(r: &Matrix3<f64>, t: &Vector3<f64>) -> Matrix3x4<f64> {
    let mut p = Matrix3x4::zeros();
    p.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    p.set_column(3, t);
    p
}

/// DLT pose from ≥6 calibrated correspondences.
fn dlt_pose(x_camera: &[[f64; 2]], points: &[[f64; 3]]) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    let n = x_camera.len();
    let (t2, xn) = normalize_points(x_camera);
    let (t3, pn) = normalize_points_3d(points);

    let mut a = DMatrix::zeros(2 * n, 12);
    for i in 0..n {
        let xh = Vector4::new(pn[i][0], pn[i][1], pn[i][2], 1.0);
        let (u, v) = (xn[i][0], xn[i][1]);
        for k in 0..4 {
            a[(2 * i, k)] = xh[k];
            a[(2 * i, 8 + k)] = -u * xh[k];
            a[(2 * i + 1, 4 + k)] = xh[k];
            a[(2 * i + 1, 8 + k)] = -v * xh[k];
        }
    }

    let (p, gap) = smallest_eigenvector(&a);
    if gap < DEGENERATE_GAP {
        tracing::trace!(gap, "resection DLT rank deficient");
        return None;
    }

    #[rustfmt::skip]
    let p_norm = Matrix3x4::new(
        p[0], p[1], p[2], p[3],
        p[4], p[5], p[6], p[7],
        p[8], p[9], p[10], p[11],
    );
    let mut proj = t2.try_inverse()? * p_norm * t3;

    let mut m: Matrix3<f64> = proj.fixed_view::<3, 3>(0, 0).into_owned();
    let det = m.determinant();
    if !det.is_finite() || det.abs() < 1e-300 {
        return None;
    }
    if det < 0.0 {
        proj = -proj;
        m = -m;
    }

    let svd = m.svd(true, true);
    let r = svd.u? * svd.v_t?;
    if r.determinant() < 0.0 {
        return None;
    }
    let scale = svd.singular_values.iter().product::<f64>().cbrt();
    if scale <= 0.0 || !scale.is_finite() {
        return None;
    }
    let t: Vector3<f64> = proj.column(3) / scale;

    let in_front = points
        .iter()
        .filter(|p| (r * Vector3::from(**p) + t).z > 0.0)
        .count();
    if 2 * in_front < n {
        return None;
    }
    Some((r, t))
}

fn calibrated_cost(
    r: &Matrix3<f64>,
    t: &Vector3<f64>,
    x_camera: &[[f64; 2]],
    points: &[[f64; 3]],
) -> f64 {
    let mut cost = 0.0;
    for (x, p) in x_camera.iter().zip(points) {
        let xc = r * Vector3::from(*p) + t;
        if xc.z <= MIN_DEPTH {
            return f64::INFINITY;
        }
        cost += distance_sq([xc.x / xc.z, xc.y / xc.z], *x);
    }
    cost
}

/// Gauss-Newton refinement of `(R, t)` on calibrated reprojection error.
fn refine_pose(
    mut r: Matrix3<f64>,
    mut t: Vector3<f64>,
    x_camera: &[[f64; 2]],
    points: &[[f64; 3]],
) -> (Matrix3<f64>, Vector3<f64>) {
    let mut best = calibrated_cost(&r, &t, x_camera, points);
    for _ in 0..MAX_REFINE_ITERATIONS {
        let mut h = Matrix6::<f64>::zeros();
        let mut g = Vector6::<f64>::zeros();
        for (x, p) in x_camera.iter().zip(points) {
            let rx = r * Vector3::from(*p);
            let xc = rx + t;
            if xc.z <= MIN_DEPTH {
                continue;
            }
            let inv_z = 1.0 / xc.z;
            let res = Vector2::new(xc.x * inv_z - x[0], xc.y * inv_z - x[1]);
            let dn = Matrix2x3::new(
                inv_z,
                0.0,
                -xc.x * inv_z * inv_z,
                0.0,
                inv_z,
                -xc.y * inv_z * inv_z,
            );
            let mut dxc = Matrix3x6::<f64>::zeros();
            dxc.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-skew(&rx)));
            dxc.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());
            let j = dn * dxc;
            h += j.transpose() * j;
            g += j.transpose() * res;
        }

        let Some(delta) = h.lu().solve(&(-g)) else {
            break;
        };
        let omega: Vector3<f64> = delta.fixed_rows::<3>(0).into_owned();
        let r_new = Rotation3::new(omega).into_inner() * r;
        let t_new = t + delta.fixed_rows::<3>(3);
        let cost = calibrated_cost(&r_new, &t_new, x_camera, points);
        if !(cost < best) {
            break;
        }
        r = r_new;
        t = t_new;
        best = cost;
        if delta.norm() < 1e-15 {
            break;
        }
    }
    (r, t)
}

/// Pose `[R|t]` from ≥6 calibrated image points and their 3D positions.
///
/// `x_camera` are normalized camera coordinates (`K⁻¹ x`). Returns `None` for
/// degenerate (e.g. coplanar) configurations.
pub fn euclidean_resection(
    x_camera: &[[f64; 2]],
    points: &[[f64; 3]],
) -> Option<Matrix3x4<f64>> {
    if x_camera.len() != points.len() || x_camera.len() < 6 {
        return None;
    }
    let (r, t) = dlt_pose(x_camera, points)?;
    let (r, t) = refine_pose(r, t, x_camera, points);
    Some(compose(&r, &t))
}

/// Robust-estimation adapter for calibrated camera resection.
///
/// The model is `[R|t] = K⁻¹ P`; residuals are squared pixel distances.
#[derive(Debug, Clone)]
pub struct EuclideanResectionKernel<'a> {
    x_image: &'a [[f64; 2]],
    x_camera: Vec<[f64; 2]>,
    points: &'a [[f64; 3]],
    k: Matrix3<f64>,
}

impl<'a> EuclideanResectionKernel<'a> {
    pub fn new(
        x_image: &'a [[f64; 2]],
        points: &'a [[f64; 3]],
        k: &Matrix3<f64>,
    ) -> Result<Self, KernelError> {
        check_lengths(x_image.len(), points.len())?;
        let k_inv = k.try_inverse().ok_or(KernelError::SingularIntrinsics)?;
        if !k_inv.iter().all(|v| v.is_finite()) {
            return Err(KernelError::SingularIntrinsics);
        }
        let x_camera = x_image.iter().map(|x| project(&k_inv, *x)).collect();
        Ok(Self {
            x_image,
            x_camera,
            points,
            k: *k,
        })
    }

    fn gather(&self, indices: &[usize]) -> (Vec<[f64; 2]>, Vec<[f64; 3]>) {
        (
            indices.iter().map(|&i| self.x_camera[i]).collect(),
            indices.iter().map(|&i| self.points[i]).collect(),
        )
    }
}

impl Kernel for EuclideanResectionKernel<'_> {
    type Model = Matrix3x4<f64>;

    fn minimal_sample_size(&self) -> usize {
        6
    }

    fn num_correspondences(&self) -> usize {
        self.x_image.len()
    }

    fn fit_minimal(&self, sample: &[usize]) -> Option<Matrix3x4<f64>> {
        let (x, p) = self.gather(sample);
        let (r, t) = dlt_pose(&x, &p)?;
        Some(compose(&r, &t))
    }

    fn fit_inliers(&self, inliers: &[usize]) -> Option<Matrix3x4<f64>> {
        let (x, p) = self.gather(inliers);
        euclidean_resection(&x, &p)
    }

    fn residual(&self, model: &Matrix3x4<f64>, index: usize) -> f64 {
        let p = self.points[index];
        let xc = model * Vector4::new(p[0], p[1], p[2], 1.0);
        if xc.z <= MIN_DEPTH {
            return f64::INFINITY;
        }
        let q = self.k * xc;
        distance_sq([q.x / q.z, q.y / q.z], self.x_image[index])
    }
}

/// Robust pose from pixel observations, 3D points and intrinsics `k`.
/// `max_error` is in pixels.
pub fn euclidean_resection_robust(
    x_image: &[[f64; 2]],
    points: &[[f64; 3]],
    k: &Matrix3<f64>,
    max_error: f64,
    config: &RansacConfig,
) -> Result<Estimate<Matrix3x4<f64>>, EstimateError> {
    let kernel = EuclideanResectionKernel::new(x_image, points, k)?;
    estimate(&kernel, max_error, config)
}
