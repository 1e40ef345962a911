//! Feature-based camera motion estimation against a fixed reference image.

/// Difference-of-Gaussians keypoints and gradient-histogram descriptors.
pub mod features;
/// Nearest-neighbour descriptor matching with a ratio test.
pub mod matcher;
/// Reference-to-frame homography estimation.
pub mod tracker;
