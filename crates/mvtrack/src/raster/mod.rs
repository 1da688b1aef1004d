//! Float rasters, filters and pyramids used by the region trackers.

pub mod filters;
pub mod float_image;
pub mod pyramid;

pub use filters::{blur, blurred_gradients, downsample_2x};
pub use float_image::{FloatImage, Luma32Image};
pub use pyramid::{Gradients, ImageLevel, LazyPyramid};
