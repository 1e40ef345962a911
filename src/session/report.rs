use crate::classify::violation::{Classification, CrossingColor};
use crate::foundation::core::{FrameIndex, Point};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::geometry::projector::CrossingLine;
use crate::schedule::clock::LightState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Where a frame's transform came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Estimated on this frame.
    Fresh,
    /// Reused from an earlier frame.
    Stale,
    /// Nothing usable.
    Lost,
}

/// Why an intersection was not drawn on a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No baseline homography.
    CalibrationMissing,
    /// Tracking failed and the fallback policy gave nothing.
    TransformUnavailable,
    /// A vertex projected to infinity.
    DegenerateProjection,
}

/// Per-intersection result for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntersectionReport {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TrackingStatus>,
    /// Projected boundary polygon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crossing: Option<CrossingLine>,
    /// Signal classification. Always present: light state does not depend on tracking.
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl IntersectionReport {
    /// Resolved crossing color.
    pub fn color(&self) -> CrossingColor {
        self.classification.color
    }

    /// Whether geometry was drawn.
    pub fn is_drawn(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Everything the overlay decided for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: FrameIndex,
    pub tracking: TrackingStatus,
    /// Ratio-test survivors and RANSAC inliers when estimation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<(usize, usize)>,
    pub intersections: Vec<IntersectionReport>,
    /// State of every light with a panel or an intersection signal.
    pub lights: BTreeMap<String, LightState>,
    pub masks_drawn: usize,
    pub masks_skipped: usize,
}

impl FrameReport {
    pub fn intersection(&self, id: &str) -> Option<&IntersectionReport> {
        self.intersections.iter().find(|i| i.id == id)
    }
}

/// Writes one JSON object per frame (JSON Lines).
pub struct ReportWriter<W: Write> {
    out: BufWriter<W>,
    written: u64,
}

impl ReportWriter<File> {
    /// Create (truncate) a report file.
    pub fn create(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        crate::encode::ffmpeg::ensure_parent_dir(path)?;
        let f = File::create(path).map_err(|e| {
            OverlayError::validation(format!("create report '{}': {e}", path.display()))
        })?;
        Ok(Self::new(f))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: BufWriter::new(out),
            written: 0,
        }
    }

    /// Append one frame.
    pub fn write(&mut self, report: &FrameReport) -> OverlayResult<()> {
        serde_json::to_writer(&mut self.out, report)
            .map_err(|e| OverlayError::serde(format!("serialize frame report: {e}")))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| OverlayError::encode(format!("write frame report: {e}")))?;
        self.written += 1;
        Ok(())
    }

    /// Lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the inner writer.
    pub fn finish(self) -> OverlayResult<W> {
        self.out
            .into_inner()
            .map_err(|e| OverlayError::encode(format!("flush frame reports: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/report.rs"]
mod tests;
