//! Calibration annotation as an explicit state machine.
//!
//! A front end (window, web page, scripted log) turns user input into [`InputEvent`]s and feeds
//! them through [`handle_event`] together with the current [`AnnotationState`]. The function
//! returns the next state and records finished shapes into a [`CalibrationDraft`]. Nothing is
//! kept in globals, so an event log can be replayed into the same scene.

use crate::calibration::scene::{Intersection, MaskPolygon, MaskSpace, Scene};
use crate::foundation::core::Point;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::geometry::homography::Homography;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Where the annotation session currently is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AnnotationState {
    #[default]
    Idle,
    /// Clicking the four reference-image points of an intersection's world quad.
    CollectingWorldPoints(String),
    /// Clicking the vertices of an occlusion mask.
    CollectingMaskPoints,
    /// Clicking the two endpoints of an intersection's crossing line. Clicks past the second
    /// are ignored until `FinishCrossing` or `Cancel`.
    CollectingCrossingPoints(String),
}

/// One user action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    /// Start clicking the four reference-image corners of `id`.
    SelectIntersection { id: String },
    /// Start a new mask polygon.
    BeginMask,
    /// Close the mask polygon.
    FinishMask,
    /// Start a crossing line for `id`.
    BeginCrossing { id: String },
    /// Finish the crossing line.
    FinishCrossing,
    /// A click in reference-image pixels.
    Click { x: f64, y: f64 },
    /// Drop pending clicks and return to idle.
    Cancel,
}

/// Scene under construction plus the clicks of the shape being drawn.
#[derive(Clone, Debug, Default)]
pub struct CalibrationDraft {
    pub scene: Scene,
    pending: Vec<Point>,
}

impl CalibrationDraft {
    /// Start from an existing scene, typically one with world quads but no baselines.
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            pending: Vec::new(),
        }
    }

    /// Clicks of the shape in progress.
    pub fn pending(&self) -> &[Point] {
        &self.pending
    }

    /// Consume the draft.
    pub fn into_scene(self) -> Scene {
        self.scene
    }

    fn intersection_mut(&mut self, id: &str) -> Option<&mut Intersection> {
        self.scene.intersections.iter_mut().find(|i| i.id == id)
    }
}

/// Advance the annotation state machine by one event.
///
/// Events that make no sense in the current state are ignored (logged) and the state is kept.
pub fn handle_event(
    state: AnnotationState,
    event: InputEvent,
    draft: &mut CalibrationDraft,
) -> AnnotationState {
    use AnnotationState as S;
    use InputEvent as E;

    match (state, event) {
        (_, E::Cancel) => {
            draft.pending.clear();
            S::Idle
        }

        (S::Idle, E::SelectIntersection { id }) => {
            if draft.scene.intersection(&id).is_none() {
                tracing::warn!(%id, "unknown intersection");
                return S::Idle;
            }
            draft.pending.clear();
            S::CollectingWorldPoints(id)
        }
        (S::Idle, E::BeginMask) => {
            draft.pending.clear();
            S::CollectingMaskPoints
        }
        (S::Idle, E::BeginCrossing { id }) => {
            let calibrated = draft.scene.intersection(&id).is_some_and(|i| i.is_calibrated());
            if !calibrated {
                tracing::warn!(%id, "crossing needs a calibrated intersection");
                return S::Idle;
            }
            draft.pending.clear();
            S::CollectingCrossingPoints(id)
        }

        (S::CollectingWorldPoints(id), E::Click { x, y }) => {
            draft.pending.push(Point::new(x, y));
            if draft.pending.len() < 4 {
                return S::CollectingWorldPoints(id);
            }
            finish_world(&id, draft);
            S::Idle
        }

        (S::CollectingMaskPoints, E::Click { x, y }) => {
            draft.pending.push(Point::new(x, y));
            S::CollectingMaskPoints
        }
        (S::CollectingMaskPoints, E::FinishMask) => {
            if draft.pending.len() < 3 {
                tracing::warn!(points = draft.pending.len(), "mask needs at least 3 points");
                return S::CollectingMaskPoints;
            }
            let vertices = std::mem::take(&mut draft.pending);
            draft.scene.masks.push(MaskPolygon {
                vertices,
                space: MaskSpace::Reference,
            });
            S::Idle
        }

        (S::CollectingCrossingPoints(id), E::Click { x, y }) => {
            if draft.pending.len() < 2 {
                draft.pending.push(Point::new(x, y));
            } else {
                tracing::debug!(%id, "crossing already has 2 points, click ignored");
            }
            S::CollectingCrossingPoints(id)
        }
        (S::CollectingCrossingPoints(id), E::FinishCrossing) => {
            if draft.pending.len() < 2 {
                tracing::warn!(%id, points = draft.pending.len(), "crossing needs 2 points");
                return S::CollectingCrossingPoints(id);
            }
            finish_crossing(&id, draft);
            S::Idle
        }

        (state, event) => {
            tracing::debug!(?state, ?event, "event ignored");
            state
        }
    }
}

/// Feed a sequence of events from `Idle`.
pub fn replay<I>(events: I, draft: &mut CalibrationDraft) -> AnnotationState
where
    I: IntoIterator<Item = InputEvent>,
{
    events
        .into_iter()
        .fold(AnnotationState::Idle, |state, ev| handle_event(state, ev, draft))
}

/// Read a JSON array of events.
pub fn read_event_log(path: impl AsRef<Path>) -> OverlayResult<Vec<InputEvent>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| {
        OverlayError::validation(format!("open event log '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| OverlayError::serde(format!("parse event log '{}': {e}", path.display())))
}

fn finish_world(id: &str, draft: &mut CalibrationDraft) {
    let clicks = std::mem::take(&mut draft.pending);
    let Some(inter) = draft.intersection_mut(id) else {
        return;
    };
    match Homography::fit_dlt(&inter.world, &clicks) {
        Ok(h) => {
            tracing::info!(%id, "baseline fitted");
            inter.baseline = Some(h);
        }
        Err(e) => tracing::warn!(%id, error = %e, "baseline fit failed, clicks discarded"),
    }
}

fn finish_crossing(id: &str, draft: &mut CalibrationDraft) {
    let clicks = std::mem::take(&mut draft.pending);
    let Some(inter) = draft.intersection_mut(id) else {
        return;
    };
    let to_world = inter.baseline.as_ref().and_then(Homography::inverse);
    let mapped = to_world.and_then(|inv| Some([inv.project(clicks[0])?, inv.project(clicks[1])?]));
    match mapped {
        Some(line) => inter.crossing = Some(line),
        None => tracing::warn!(%id, "crossing could not be mapped to world coordinates"),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/annotate.rs"]
mod tests;
