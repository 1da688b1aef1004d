//! Adaptive RANSAC with maximum-likelihood (truncated cost) scoring.
//!
//! The estimator is generic over [`Kernel`]; it never touches coordinates
//! itself. Each iteration draws a minimal sample without replacement, fits a
//! candidate, and scores every correspondence with `min(residual, threshold)`.
//! The iteration bound shrinks as better models raise the inlier ratio.

use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::kernel::{Kernel, KernelError};

/// Errors returned by robust estimation.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// Fewer correspondences than the kernel's minimal sample.
    TooFewCorrespondences { needed: usize, got: usize },
    /// No candidate model gathered a minimal sample worth of inliers.
    InsufficientInliers { needed: usize, found: usize },
    /// The correspondence set could not be turned into a kernel.
    InvalidInput(KernelError),
}

impl std::fmt::Display for EstimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewCorrespondences { needed, got } => {
                write!(f, "too few correspondences: need {}, got {}", needed, got)
            }
            Self::InsufficientInliers { needed, found } => {
                write!(f, "insufficient inliers: need {}, found {}", needed, found)
            }
            Self::InvalidInput(e) => write!(f, "invalid input: {}", e),
        }
    }
}

impl std::error::Error for EstimateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput(e) => Some(e),
            _ => None,
        }
    }
}

impl From<KernelError> for EstimateError {
    fn from(e: KernelError) -> Self {
        Self::InvalidInput(e)
    }
}

/// Sampling configuration for [`estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Hard cap on sampling iterations.
    pub max_iterations: usize,
    /// Probability that at least one all-inlier sample is drawn; drives the
    /// adaptive iteration bound. Must lie in (0, 1).
    pub confidence: f64,
    /// Seed for the sampling RNG.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 4096,
            confidence: 0.99,
            seed: 0,
        }
    }
}

/// Output of a successful robust estimation.
#[derive(Debug, Clone)]
pub struct Estimate<M> {
    /// Model refit on the inlier set.
    pub model: M,
    /// Ascending indices of correspondences whose residual under the best
    /// sampled model is below the threshold.
    pub inliers: Vec<usize>,
    /// Truncated cost of the best sampled model (lower is better).
    pub score: f64,
    /// Number of samples drawn.
    pub iterations: usize,
}

/// Number of samples needed so that, with probability `confidence`, at least
/// one of them contains only inliers.
pub fn adaptive_iteration_bound(inlier_ratio: f64, sample_size: usize, confidence: f64) -> f64 {
    if inlier_ratio <= 0.0 {
        return f64::INFINITY;
    }
    let p_good = inlier_ratio.min(1.0).powi(sample_size as i32);
    if p_good >= 1.0 {
        return 1.0;
    }
    let bound = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if bound.is_finite() {
        bound.max(1.0)
    } else {
        f64::INFINITY
    }
}

/// Robustly fit a model with the given kernel.
///
/// `max_error` is the inlier tolerance in the kernel's image units before
/// squaring; the residual threshold is `error_terms * max_error²`.
pub fn estimate<K: Kernel>(
    kernel: &K,
    max_error: f64,
    config: &RansacConfig,
) -> Result<Estimate<K::Model>, EstimateError> {
    let n = kernel.num_correspondences();
    let s = kernel.minimal_sample_size();
    if n < s {
        return Err(EstimateError::TooFewCorrespondences { needed: s, got: n });
    }

    let threshold = kernel.error_terms() as f64 * max_error * max_error;
    let confidence = config.confidence.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
    let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);

    let mut best: Option<(K::Model, f64)> = None;
    let mut best_inliers: Vec<usize> = Vec::new();
    let mut bound = f64::INFINITY;
    let mut iteration = 0usize;
    let mut degenerate = 0usize;

    while iteration < config.max_iterations && (iteration as f64) < bound {
        iteration += 1;
        let sample = sample_indices(&mut rng, n, s);
        let Some(model) = kernel.fit_minimal(&sample) else {
            degenerate += 1;
            tracing::trace!(iteration, "degenerate sample skipped");
            continue;
        };

        let mut score = 0.0f64;
        let mut inliers = Vec::new();
        for i in 0..n {
            let r = kernel.residual(&model, i);
            if r.is_finite() && r < threshold {
                score += r;
                inliers.push(i);
            } else {
                score += threshold;
            }
        }

        let improved = match &best {
            Some((_, best_score)) => score < *best_score,
            None => true,
        };
        if improved {
            let ratio = inliers.len() as f64 / n as f64;
            bound = adaptive_iteration_bound(ratio, s, confidence);
            tracing::trace!(iteration, score, inliers = inliers.len(), bound, "new best model");
            best = Some((model, score));
            best_inliers = inliers;
        }
    }

    let Some((best_model, best_score)) = best else {
        tracing::debug!(iteration, degenerate, "no valid sample");
        return Err(EstimateError::InsufficientInliers { needed: s, found: 0 });
    };
    if best_inliers.len() < s {
        return Err(EstimateError::InsufficientInliers {
            needed: s,
            found: best_inliers.len(),
        });
    }

    let model = kernel.fit_inliers(&best_inliers).unwrap_or(best_model);
    tracing::debug!(
        iterations = iteration,
        degenerate,
        inliers = best_inliers.len(),
        total = n,
        score = best_score,
        "robust estimation finished"
    );

    Ok(Estimate {
        model,
        inliers: best_inliers,
        score: best_score,
        iterations: iteration,
    })
}

/// Sample `k` distinct indices from `0..n` (partial Fisher–Yates).
pub(crate) fn sample_indices(rng: &mut impl rand::Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::prelude::*;

    /// 1D offset model `y = x + c`, minimal sample 1.
    struct OffsetKernel {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl Kernel for OffsetKernel {
        type Model = f64;

        fn minimal_sample_size(&self) -> usize {
            1
        }

        fn num_correspondences(&self) -> usize {
            self.x.len()
        }

        fn fit_minimal(&self, sample: &[usize]) -> Option<f64> {
            let i = sample[0];
            let c = self.y[i] - self.x[i];
            // NaN marks a "degenerate" correspondence.
            c.is_finite().then_some(c)
        }

        fn fit_inliers(&self, inliers: &[usize]) -> Option<f64> {
            let sum: f64 = inliers.iter().map(|&i| self.y[i] - self.x[i]).sum();
            Some(sum / inliers.len() as f64)
        }

        fn residual(&self, model: &f64, index: usize) -> f64 {
            (self.y[index] - self.x[index] - model).powi(2)
        }
    }

    fn offset_data(n: usize, outliers: &[usize], c: f64) -> OffsetKernel {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x.iter().map(|v| v + c).collect();
        for (k, &i) in outliers.iter().enumerate() {
            y[i] += 10.0 + k as f64 * 3.0;
        }
        OffsetKernel { x, y }
    }

    #[test]
    fn sample_indices_are_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let mut s = sample_indices(&mut rng, 10, 4);
            s.sort_unstable();
            s.dedup();
            assert_eq!(s.len(), 4);
            assert!(s.iter().all(|&i| i < 10));
        }
    }

    #[test]
    fn adaptive_bound_shrinks_with_inlier_ratio() {
        let low = adaptive_iteration_bound(0.3, 4, 0.99);
        let high = adaptive_iteration_bound(0.9, 4, 0.99);
        assert!(low > high);
        assert_eq!(adaptive_iteration_bound(1.0, 4, 0.99), 1.0);
        assert!(adaptive_iteration_bound(0.0, 4, 0.99).is_infinite());
        // log(0.01) / log(1 - 0.5)
        assert_relative_eq!(
            adaptive_iteration_bound(0.5, 1, 0.99),
            0.01f64.ln() / 0.5f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn recovers_offset_and_exact_inliers() {
        let outliers = [1, 4, 7];
        let kernel = offset_data(12, &outliers, 2.5);
        let est = estimate(&kernel, 0.5, &RansacConfig::default()).unwrap();
        assert_relative_eq!(est.model, 2.5, epsilon = 1e-12);
        let expected: Vec<usize> = (0..12).filter(|i| !outliers.contains(i)).collect();
        assert_eq!(est.inliers, expected);
        // Each outlier costs the full threshold 0.25.
        assert_relative_eq!(est.score, 3.0 * 0.25, epsilon = 1e-12);
    }

    #[test]
    fn too_few_correspondences_fail_without_sampling() {
        let kernel = OffsetKernel { x: vec![], y: vec![] };
        let err = estimate(&kernel, 1.0, &RansacConfig::default()).unwrap_err();
        assert_eq!(err, EstimateError::TooFewCorrespondences { needed: 1, got: 0 });
    }

    #[test]
    fn all_degenerate_samples_report_insufficient_inliers() {
        let kernel = OffsetKernel {
            x: vec![0.0, 1.0],
            y: vec![f64::NAN, f64::NAN],
        };
        let cfg = RansacConfig {
            max_iterations: 20,
            ..Default::default()
        };
        let err = estimate(&kernel, 1.0, &cfg).unwrap_err();
        assert_eq!(err, EstimateError::InsufficientInliers { needed: 1, found: 0 });
    }

    #[test]
    fn same_seed_is_deterministic() {
        let kernel = offset_data(30, &[0, 3, 5, 11, 17, 29], -1.0);
        let cfg = RansacConfig {
            seed: 42,
            ..Default::default()
        };
        let a = estimate(&kernel, 0.1, &cfg).unwrap();
        let b = estimate(&kernel, 0.1, &cfg).unwrap();
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn iteration_cap_is_respected() {
        // Best possible inlier ratio is 0.5, so the adaptive bound stays above 6.
        let kernel = offset_data(50, &(0..25).collect::<Vec<_>>(), 0.0);
        let cfg = RansacConfig {
            max_iterations: 3,
            ..Default::default()
        };
        let est = estimate(&kernel, 0.1, &cfg).unwrap();
        assert_eq!(est.iterations, 3);
        assert!(!est.inliers.is_empty());
    }

    #[test]
    fn adaptive_bound_stops_early_on_clean_data() {
        let kernel = offset_data(100, &[], 1.0);
        let est = estimate(&kernel, 0.1, &RansacConfig::default()).unwrap();
        // The first sample explains every point, which drives the bound to 1.
        assert_eq!(est.iterations, 1);
        assert_eq!(est.inliers.len(), 100);
        assert_relative_eq!(est.model, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn adaptive_bound_stops_far_below_cap_with_outliers() {
        let outliers: Vec<usize> = (0..100).step_by(5).collect();
        let kernel = offset_data(100, &outliers, -2.0);
        let est = estimate(&kernel, 0.1, &RansacConfig::default()).unwrap();
        // An 80% inlier sample bounds the loop at ceil(ln 0.01 / ln 0.2) = 3.
        assert!(est.iterations < 20, "{} iterations", est.iterations);
        assert_eq!(est.inliers.len(), 80);
        assert_relative_eq!(est.model, -2.0, epsilon = 1e-12);
    }
}
