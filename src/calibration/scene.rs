use crate::classify::violation::{ClassifierPolicy, SignalTopology};
use crate::foundation::core::{Canvas, Point, Rgb8};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::geometry::homography::Homography;
use crate::render::lights::LightPanel;
use crate::schedule::clock::{DEFAULT_TRANSITION_FRAMES, LightSchedule, ScheduleClock};
use crate::session::sticky::FallbackPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Default perpendicular offset of a derived crossing line, in pixels.
pub const DEFAULT_CROSSING_OFFSET_PX: f64 = 9.0;

/// One calibrated intersection.
///
/// `world` is the intersection's quadrilateral in its own world coordinates. `baseline` maps
/// world coordinates into reference-image pixels; without it the intersection is never drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub id: String,
    pub world: [Point; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Homography>,
    /// Explicit crossing line in world coordinates. Derived from the first polygon edge when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossing: Option<[Point; 2]>,
    /// Offset the crossing line to the other side of its edge.
    #[serde(default)]
    pub flip_crossing: bool,
    #[serde(default = "default_color")]
    pub color: Rgb8,
    pub signal: SignalTopology,
}

fn default_color() -> Rgb8 {
    Rgb8::WHITE
}

impl Intersection {
    /// Uncalibrated intersection with a single signal named after it.
    pub fn new(id: impl Into<String>, world: [Point; 4]) -> Self {
        let id = id.into();
        Self {
            signal: SignalTopology::single(id.clone()),
            id,
            world,
            baseline: None,
            crossing: None,
            flip_crossing: false,
            color: default_color(),
        }
    }

    /// Whether a baseline homography is present.
    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }
}

/// Coordinate space a mask polygon's vertices are expressed in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskSpace {
    /// Reference-image pixels, moved by the global relative transform.
    #[default]
    Reference,
    /// World coordinates of an intersection, moved by its composed transform.
    Intersection(String),
}

/// Static occlusion polygon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskPolygon {
    pub vertices: Vec<Point>,
    #[serde(default)]
    pub space: MaskSpace,
}

/// Per-scene overlay behavior. Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayPolicy {
    /// Transition window `Y` in frames.
    pub transition_frames: u64,
    /// Show the pre-green clearance band.
    pub pre_green: bool,
    pub classifier: ClassifierPolicy,
    pub fallback: FallbackPolicy,
    pub crossing_offset_px: f64,
    /// Index assigned to the first decoded frame.
    pub frame_origin: u64,
}

impl Default for OverlayPolicy {
    fn default() -> Self {
        Self {
            transition_frames: DEFAULT_TRANSITION_FRAMES,
            pre_green: true,
            classifier: ClassifierPolicy::default(),
            fallback: FallbackPolicy::default(),
            crossing_offset_px: DEFAULT_CROSSING_OFFSET_PX,
            frame_origin: 1,
        }
    }
}

/// Everything the overlay engine needs besides the video itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Reference image path, relative to the scene file's directory when not absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,
    /// Expected frame size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<Canvas>,
    #[serde(default)]
    pub intersections: Vec<Intersection>,
    #[serde(default)]
    pub masks: Vec<MaskPolygon>,
    #[serde(default)]
    pub light_panels: Vec<LightPanel>,
    #[serde(default)]
    pub schedule: LightSchedule,
    #[serde(default)]
    pub policy: OverlayPolicy,
}

impl Scene {
    /// Parse a scene from JSON.
    pub fn from_reader<R: std::io::Read>(r: R) -> OverlayResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| OverlayError::serde(format!("parse scene JSON: {e}")))
    }

    /// Parse a scene from a JSON file. A relative `reference_image` is resolved against the
    /// file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            OverlayError::validation(format!("open scene JSON '{}': {e}", path.display()))
        })?;
        let mut scene = Self::from_reader(BufReader::new(f))?;
        if let (Some(img), Some(dir)) = (scene.reference_image.as_mut(), path.parent())
            && img.is_relative()
        {
            *img = dir.join(&*img);
        }
        Ok(scene)
    }

    /// Write the scene as pretty JSON.
    pub fn to_json_pretty(&self) -> OverlayResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| OverlayError::serde(format!("serialize scene: {e}")))
    }

    /// Look up an intersection by id.
    pub fn intersection(&self, id: &str) -> Option<&Intersection> {
        self.intersections.iter().find(|i| i.id == id)
    }

    /// Schedule clock configured from the policy.
    pub fn clock(&self) -> ScheduleClock {
        ScheduleClock::new(self.schedule.clone(), self.policy.transition_frames)
            .with_pre_green(self.policy.pre_green)
    }

    /// Check structural consistency.
    ///
    /// Hard errors: duplicate or empty ids, non-finite coordinates, masks with fewer than three
    /// vertices or pointing at an unknown intersection, bad schedule windows. Missing baselines
    /// and lights absent from the schedule are only warned about: those intersections are
    /// skipped or read as red at run time.
    pub fn validate(&self) -> OverlayResult<()> {
        let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
        let mut ids = BTreeSet::new();
        for i in &self.intersections {
            if i.id.is_empty() {
                return Err(OverlayError::calibration("intersection id must be non-empty"));
            }
            if !ids.insert(i.id.as_str()) {
                return Err(OverlayError::calibration(format!(
                    "duplicate intersection id '{}'",
                    i.id
                )));
            }
            if !i.world.iter().all(finite) {
                return Err(OverlayError::calibration(format!(
                    "intersection '{}' has non-finite world points",
                    i.id
                )));
            }
            if let Some(c) = &i.crossing
                && !c.iter().all(finite)
            {
                return Err(OverlayError::calibration(format!(
                    "intersection '{}' has a non-finite crossing line",
                    i.id
                )));
            }
            match &i.baseline {
                Some(h) if !h.is_finite() => {
                    return Err(OverlayError::calibration(format!(
                        "intersection '{}' baseline is not finite",
                        i.id
                    )));
                }
                Some(_) => {}
                None => tracing::warn!(id = %i.id, "intersection has no baseline, it will be skipped"),
            }
            for (_, light) in i.signal.lights() {
                if !self.schedule.contains(light) {
                    tracing::warn!(id = %i.id, light, "light missing from schedule, reads as red");
                }
            }
        }

        for (n, m) in self.masks.iter().enumerate() {
            if m.vertices.len() < 3 {
                return Err(OverlayError::calibration(format!(
                    "mask {n} has {} vertices, need at least 3",
                    m.vertices.len()
                )));
            }
            if !m.vertices.iter().all(finite) {
                return Err(OverlayError::calibration(format!("mask {n} has non-finite vertices")));
            }
            if let MaskSpace::Intersection(id) = &m.space
                && !ids.contains(id.as_str())
            {
                return Err(OverlayError::calibration(format!(
                    "mask {n} refers to unknown intersection '{id}'"
                )));
            }
        }

        for p in &self.light_panels {
            if !finite(&p.center) {
                return Err(OverlayError::validation(format!(
                    "light panel '{}' has a non-finite center",
                    p.light
                )));
            }
        }

        if !self.policy.crossing_offset_px.is_finite() {
            return Err(OverlayError::validation("crossing_offset_px must be finite"));
        }
        if let Some(c) = self.canvas
            && (c.width == 0 || c.height == 0)
        {
            return Err(OverlayError::validation("canvas width/height must be non-zero"));
        }

        self.schedule.validate(self.policy.transition_frames)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/scene.rs"]
mod tests;
