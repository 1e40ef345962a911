use crate::foundation::core::{FrameIndex, Point};
use crate::geometry::homography::{Homography, HomographyError, RansacConfig};
use crate::render::frame::FrameRGBA;
use crate::tracking::features::{FeatureSet, ScaleSpaceConfig, detect_and_describe};
use crate::tracking::matcher::{DEFAULT_RATIO, ratio_matches};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Tracker parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Lowe ratio for the 2-NN test.
    pub ratio: f32,
    /// Minimum surviving matches before a fit is attempted.
    pub min_matches: usize,
    /// Robust fit parameters (reprojection threshold in pixels).
    pub ransac: RansacConfig,
    /// Downscale images whose longer side exceeds this before feature extraction.
    pub max_working_dim: Option<u32>,
    /// Detector parameters.
    pub scale_space: ScaleSpaceConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            min_matches: 10,
            ransac: RansacConfig::default(),
            max_working_dim: Some(1280),
            scale_space: ScaleSpaceConfig::default(),
        }
    }
}

/// Why no transform was produced for a frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackingFailure {
    /// The frame could not be converted to intensity.
    #[error("frame is not a valid RGBA8 image")]
    InvalidFrame,
    /// Too few ratio-test survivors.
    #[error("too few matches: need {needed}, found {found}")]
    TooFewMatches { needed: usize, found: usize },
    /// The robust fit failed.
    #[error("homography fit failed: {0}")]
    Fit(#[from] HomographyError),
}

/// A successful reference-to-frame estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedMotion {
    /// Maps reference pixels to current-frame pixels.
    pub homography: Homography,
    /// Ratio-test survivors.
    pub matches: usize,
    /// RANSAC inliers among them.
    pub inliers: usize,
}

/// Source of per-frame relative transforms.
///
/// Implementations must not depend on previously tracked frames: the batch scheduler calls
/// `track` for many frames concurrently and in any order.
pub trait MotionEstimator: Send + Sync {
    /// Transform mapping the session reference image onto `current`.
    fn track(&self, frame: FrameIndex, current: &FrameRGBA) -> Result<TrackedMotion, TrackingFailure>;
}

/// Reference-image features, extracted once per session.
#[derive(Clone, Debug)]
pub struct ReferenceFeatures {
    features: FeatureSet,
    width: u32,
    height: u32,
}

impl ReferenceFeatures {
    /// Extract features from the reference image.
    pub fn extract(reference: &FrameRGBA, cfg: &TrackerConfig) -> Result<Self, TrackingFailure> {
        let gray = reference.to_gray().map_err(|_| TrackingFailure::InvalidFrame)?;
        Ok(Self {
            features: extract_features(&gray, cfg),
            width: reference.width,
            height: reference.height,
        })
    }

    /// The cached features.
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Reference image dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Estimates the homography from the fixed reference image to each frame.
#[derive(Clone, Debug)]
pub struct HomographyTracker {
    cfg: TrackerConfig,
    reference: ReferenceFeatures,
}

impl HomographyTracker {
    /// Build a tracker, extracting reference features up front.
    pub fn new(reference: &FrameRGBA, cfg: TrackerConfig) -> Result<Self, TrackingFailure> {
        let reference = ReferenceFeatures::extract(reference, &cfg)?;
        tracing::info!(
            features = reference.features.len(),
            width = reference.width,
            height = reference.height,
            "reference features extracted"
        );
        Ok(Self { cfg, reference })
    }

    /// Tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.cfg
    }

    /// Cached reference features.
    pub fn reference(&self) -> &ReferenceFeatures {
        &self.reference
    }

    /// Reference-to-current transform, `None` on insufficient matches or a degenerate fit.
    pub fn estimate(&self, current: &FrameRGBA) -> Option<Homography> {
        self.estimate_detailed(current).ok().map(|m| m.homography)
    }

    /// Like [`Self::estimate`], reporting match counts or the failure reason.
    pub fn estimate_detailed(&self, current: &FrameRGBA) -> Result<TrackedMotion, TrackingFailure> {
        let gray = current.to_gray().map_err(|_| TrackingFailure::InvalidFrame)?;
        let cur = extract_features(&gray, &self.cfg);

        let matches = ratio_matches(
            &cur.descriptors,
            &self.reference.features.descriptors,
            self.cfg.ratio,
        );
        if matches.len() < self.cfg.min_matches {
            return Err(TrackingFailure::TooFewMatches {
                needed: self.cfg.min_matches,
                found: matches.len(),
            });
        }

        let (src, dst): (Vec<Point>, Vec<Point>) = matches
            .iter()
            .map(|m| {
                (
                    self.reference.features.keypoints[m.train].position,
                    cur.keypoints[m.query].position,
                )
            })
            .unzip();
        let fit = Homography::fit_ransac(&src, &dst, &self.cfg.ransac)?;
        Ok(TrackedMotion {
            homography: fit.homography,
            matches: matches.len(),
            inliers: fit.n_inliers,
        })
    }
}

impl MotionEstimator for HomographyTracker {
    #[tracing::instrument(level = "debug", skip(self, current), fields(frame = frame.0))]
    fn track(&self, frame: FrameIndex, current: &FrameRGBA) -> Result<TrackedMotion, TrackingFailure> {
        let res = self.estimate_detailed(current);
        match &res {
            Ok(m) => tracing::debug!(matches = m.matches, inliers = m.inliers, "tracked"),
            Err(e) => tracing::debug!(error = %e, "tracking failed"),
        }
        res
    }
}

/// One-shot estimate between two images.
///
/// Prefer [`HomographyTracker`] for video, which extracts the reference features only once.
pub fn estimate(
    reference: &FrameRGBA,
    current: &FrameRGBA,
    cfg: &TrackerConfig,
) -> Option<Homography> {
    HomographyTracker::new(reference, cfg.clone())
        .ok()?
        .estimate(current)
}

fn extract_features(gray: &GrayImage, cfg: &TrackerConfig) -> FeatureSet {
    let (w, h) = gray.dimensions();
    let long = w.max(h);
    match cfg.max_working_dim {
        Some(max) if max > 0 && long > max => {
            let scale = f64::from(max) / f64::from(long);
            let nw = ((f64::from(w) * scale).round() as u32).max(1);
            let nh = ((f64::from(h) * scale).round() as u32).max(1);
            let small = image::imageops::resize(gray, nw, nh, image::imageops::FilterType::Triangle);
            let mut set = detect_and_describe(&small, &cfg.scale_space);
            set.rescale(1.0 / scale);
            set
        }
        _ => detect_and_describe(gray, &cfg.scale_space),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tracking/tracker.rs"]
mod tests;
