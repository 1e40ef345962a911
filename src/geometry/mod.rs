//! Projective geometry: homographies and calibration-geometry reprojection.

/// 3x3 projective transforms, DLT and RANSAC fitting.
pub mod homography;
/// Point, polygon and crossing-line projection.
pub mod projector;
