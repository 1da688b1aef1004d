//! Multi-view geometry: model kernels and robust estimation.

pub mod euclidean;
pub mod homography;
pub mod kernel;
pub mod registration;
pub mod resection;
pub mod robust;
pub mod similarity;

pub use euclidean::{
    euclidean_2d_from_correspondences_linear, euclidean_2d_robust,
    euclidean_3d_from_correspondences_linear, euclidean_3d_robust,
    extract_euclidean_2d_coefficients, Euclidean2DKernel, Euclidean3DKernel,
    DEFAULT_EXPECTED_PRECISION,
};
pub use homography::{
    homography_2d_from_correspondences_4point_robust, homography_2d_from_correspondences_linear,
    homography_2d_robust, HomographyKernel,
};
pub use kernel::{Kernel, KernelError};
pub use registration::{iterative_closest_points, IcpResult};
pub use resection::{euclidean_resection, euclidean_resection_robust, EuclideanResectionKernel};
pub use robust::{adaptive_iteration_bound, estimate, Estimate, EstimateError, RansacConfig};
pub use similarity::{
    extract_similarity_2d_coefficients, similarity_2d_from_correspondences_linear,
    similarity_2d_robust, Similarity2DKernel,
};
