//! The model-kernel contract shared by all robust estimators.

/// Errors raised when a kernel or a linear solver receives malformed input.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelError {
    /// The two sides of a correspondence set have different lengths.
    LengthMismatch { left: usize, right: usize },
    /// A linear solver was given fewer correspondences than it needs.
    TooFewPoints { needed: usize, got: usize },
    /// The camera intrinsics matrix cannot be inverted.
    SingularIntrinsics,
    /// The points do not constrain the model (coincident, collinear, ...).
    Degenerate,
}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { left, right } => {
                write!(f, "correspondence length mismatch: {} vs {}", left, right)
            }
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::SingularIntrinsics => write!(f, "camera intrinsics are singular"),
            Self::Degenerate => write!(f, "degenerate point configuration"),
        }
    }
}

impl std::error::Error for KernelError {}

pub(crate) fn check_lengths(left: usize, right: usize) -> Result<(), KernelError> {
    if left != right {
        return Err(KernelError::LengthMismatch { left, right });
    }
    Ok(())
}

/// Adapter between a geometric model and a correspondence set.
///
/// Kernels are stateless apart from borrowed input data; the estimator only
/// talks to the data through correspondence indices.
pub trait Kernel {
    type Model: Clone;

    /// Number of correspondences needed to fit one model.
    fn minimal_sample_size(&self) -> usize;

    /// Size of the correspondence set.
    fn num_correspondences(&self) -> usize;

    /// Fit a model to exactly `minimal_sample_size()` correspondences.
    ///
    /// Returns `None` for degenerate samples.
    fn fit_minimal(&self, sample: &[usize]) -> Option<Self::Model>;

    /// Least-squares refit over an arbitrary inlier set.
    fn fit_inliers(&self, inliers: &[usize]) -> Option<Self::Model>;

    /// Squared error of correspondence `index` under `model`.
    fn residual(&self, model: &Self::Model, index: usize) -> f64;

    /// Number of squared image-space errors summed into one residual.
    fn error_terms(&self) -> usize {
        1
    }
}
