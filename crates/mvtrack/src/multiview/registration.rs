//! Iterative closest points registration of two 3D point clouds.

use nalgebra::{Matrix3, Vector3};

use super::euclidean::kabsch;

/// Transform aligning `points` onto `reference`:
/// `reference ≈ rotation * diag(scale) * points + translation`.
#[derive(Debug, Clone, PartialEq)]
pub struct IcpResult {
    pub rotation: Matrix3<f64>,
    /// Per-axis scale.
    pub scale: Vector3<f64>,
    pub translation: Vector3<f64>,
    /// Iterations actually run.
    pub iterations: usize,
    /// Mean residual distance of the last iteration's pairing.
    pub error: f64,
}

impl IcpResult {
    fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            scale: Vector3::repeat(1.0),
            translation: Vector3::zeros(),
            iterations: 0,
            error: 0.0,
        }
    }

    /// Apply the transform to one point.
    pub fn transform(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p.component_mul(&self.scale) + self.translation
    }
}

/// Pair every point of the smaller cloud with its nearest neighbour in the
/// larger one (brute force). Returns `(reference_side, points_side)`.
fn closest_pairs(
    reference: &[Vector3<f64>],
    points: &[Vector3<f64>],
) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let (small, large, swapped) = if points.len() < reference.len() {
        (points, reference, true)
    } else {
        (reference, points, false)
    };

    let mut out_small = Vec::with_capacity(small.len());
    let mut out_large = Vec::with_capacity(small.len());
    for a in small {
        let nearest = large.iter().min_by(|p, q| {
            (*p - a)
                .norm_squared()
                .partial_cmp(&(*q - a).norm_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(b) = nearest {
            out_small.push([a.x, a.y, a.z]);
            out_large.push([b.x, b.y, b.z]);
        }
    }
    if swapped {
        (out_large, out_small)
    } else {
        (out_small, out_large)
    }
}

/// Register `points` onto `reference` by alternating nearest-neighbour
/// pairing and a closed-form similarity fit.
///
/// Stops after `max_iterations` or when the mean error changes by less than
/// `threshold` between iterations.
pub fn iterative_closest_points(
    reference: &[[f64; 3]],
    points: &[[f64; 3]],
    max_iterations: usize,
    threshold: f64,
) -> IcpResult {
    let reference: Vec<Vector3<f64>> = reference.iter().map(|p| Vector3::from(*p)).collect();
    let points: Vec<Vector3<f64>> = points.iter().map(|p| Vector3::from(*p)).collect();

    let mut result = IcpResult::identity();
    let mut previous_error = 0.0;
    tracing::debug!(max_iterations, threshold, "iterative closest points");

    for iteration in 0..max_iterations {
        let moved: Vec<Vector3<f64>> = points.iter().map(|p| result.transform(p)).collect();
        let (ref_pairs, pt_pairs) = closest_pairs(&reference, &moved);
        let Some((r, t, s)) = kabsch(&pt_pairs, &ref_pairs, true) else {
            break;
        };

        result.rotation = r * result.rotation;
        result.scale *= s;
        result.translation = r * result.translation * s + t;
        result.iterations = iteration + 1;

        let error = pt_pairs
            .iter()
            .zip(&ref_pairs)
            .map(|(p, q)| (r * Vector3::from(*p) * s + t - Vector3::from(*q)).norm())
            .sum::<f64>()
            / pt_pairs.len() as f64;
        result.error = error;
        tracing::trace!(iteration, pairs = pt_pairs.len(), error, "icp iteration");

        if (previous_error - error).abs() < threshold {
            break;
        }
        previous_error = error;
    }
    result
}
