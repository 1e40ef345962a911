use crate::foundation::error::{OverlayError, OverlayResult};
use crate::schedule::clock::{GreenWindow, LightSchedule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a phase step's green window starts within a cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStart {
    /// At the start of the cycle.
    CycleStart,
    /// One gap after the named light's window ends.
    After(String),
    /// Together with the named light's window.
    With(String),
}

/// One light's green phase inside a cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStep {
    /// Light id.
    pub light: String,
    /// Anchor of the window start.
    pub start: PhaseStart,
    /// Green duration in frames.
    pub duration: u64,
}

/// Alternate durations applied to cycles starting at or after `at_frame`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationSwitch {
    /// First cycle-start frame the alternate durations apply to.
    pub at_frame: u64,
    /// Per-light duration overrides. Lights not listed keep their step duration.
    pub durations: BTreeMap<String, u64>,
}

/// A repeating signal cycle.
///
/// Steps are evaluated in order and may only reference lights of earlier steps. A cycle ends when
/// its last window ends; the next cycle starts one gap later. Windows are clipped to
/// `total_frames`, windows starting past it are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePlan {
    /// Ordered phase steps of one cycle.
    pub steps: Vec<PhaseStep>,
    /// Frames between dependent phases and between cycles.
    pub gap_frames: u64,
    /// Length of the video in frames.
    pub total_frames: u64,
    /// Optional duration switch.
    #[serde(default)]
    pub switch: Option<DurationSwitch>,
}

impl CyclePlan {
    /// Parse a plan from a JSON file on disk.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let f = std::fs::File::open(path).map_err(|e| {
            OverlayError::validation(format!("open cycle plan '{}': {e}", path.display()))
        })?;
        serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| OverlayError::serde(format!("parse cycle plan JSON: {e}")))
    }

    /// Four-arm plan observed on the surveyed intersection: two through phases, then a split
    /// arm whose left and forward signals release the opposite arm's signals in turn.
    pub fn four_arm_default() -> Self {
        let step = |light: &str, start: PhaseStart, duration| PhaseStep {
            light: light.to_string(),
            start,
            duration,
        };
        let after = |l: &str| PhaseStart::After(l.to_string());
        Self {
            steps: vec![
                step("ID-2", PhaseStart::CycleStart, 360),
                step("ID-4", after("ID-2"), 360),
                step("ID-1-L", after("ID-4"), 450),
                step("ID-1-F", PhaseStart::With("ID-1-L".to_string()), 1230),
                step("ID-3-F", after("ID-1-L"), 1230),
                step("ID-3-L", after("ID-1-F"), 450),
            ],
            gap_frames: 150,
            total_frames: 895 * 30,
            switch: Some(DurationSwitch {
                at_frame: 11_250,
                durations: BTreeMap::from([("ID-2".to_string(), 390), ("ID-4".to_string(), 420)]),
            }),
        }
    }

    /// Check step references.
    pub fn validate(&self) -> OverlayResult<()> {
        if self.steps.is_empty() {
            return Err(OverlayError::validation("cycle plan must have at least one step"));
        }
        let mut seen = Vec::<&str>::with_capacity(self.steps.len());
        for s in &self.steps {
            if seen.contains(&s.light.as_str()) {
                return Err(OverlayError::validation(format!(
                    "cycle plan lists light '{}' twice",
                    s.light
                )));
            }
            match &s.start {
                PhaseStart::CycleStart => {}
                PhaseStart::After(r) | PhaseStart::With(r) => {
                    if !seen.contains(&r.as_str()) {
                        return Err(OverlayError::validation(format!(
                            "step '{}' references '{r}', which is not an earlier step",
                            s.light
                        )));
                    }
                }
            }
            seen.push(&s.light);
        }
        Ok(())
    }

    /// Expand the plan into a [`LightSchedule`].
    pub fn build(&self) -> OverlayResult<LightSchedule> {
        self.validate()?;

        let mut schedule = LightSchedule::new();
        for s in &self.steps {
            schedule.insert(s.light.clone(), Vec::new());
        }

        let mut cycle_start = 0u64;
        let mut cycles = 0u64;
        while cycle_start < self.total_frames {
            let durations = self
                .switch
                .as_ref()
                .filter(|sw| cycle_start >= sw.at_frame)
                .map(|sw| &sw.durations);

            // Unclipped (start, end) per light for this cycle.
            let mut placed = BTreeMap::<&str, (u64, u64)>::new();
            let mut cycle_end = cycle_start;
            for step in &self.steps {
                let start = match &step.start {
                    PhaseStart::CycleStart => cycle_start,
                    PhaseStart::After(r) => placed[r.as_str()].1.saturating_add(self.gap_frames),
                    PhaseStart::With(r) => placed[r.as_str()].0,
                };
                let dur = durations
                    .and_then(|d| d.get(&step.light))
                    .copied()
                    .unwrap_or(step.duration);
                let end = start.saturating_add(dur);
                placed.insert(&step.light, (start, end));
                cycle_end = cycle_end.max(end);

                if start < self.total_frames {
                    schedule.push(
                        step.light.clone(),
                        GreenWindow::new(start, end.min(self.total_frames)),
                    );
                }
            }

            let next = cycle_end.saturating_add(self.gap_frames);
            if next <= cycle_start {
                return Err(OverlayError::validation(
                    "cycle plan does not advance (all durations and the gap are zero)",
                ));
            }
            cycle_start = next;
            cycles += 1;
        }

        tracing::debug!(cycles, lights = self.steps.len(), "built cycle schedule");
        Ok(schedule)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/cycle.rs"]
mod tests;
