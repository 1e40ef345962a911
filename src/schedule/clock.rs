use crate::foundation::core::FrameIndex;
use crate::foundation::error::{OverlayError, OverlayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default transition (clearance) window length in frames.
pub const DEFAULT_TRANSITION_FRAMES: u64 = 75;

/// Phase state of one traffic light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightState {
    /// Stop.
    Red,
    /// Clearance, before or after a green window.
    Yellow,
    /// Go.
    Green,
}

impl LightState {
    /// Lower-case name, as used in reports and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl std::fmt::Display for LightState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open green interval `[start, end)` in frames.
///
/// Serialized as a `[start, end]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u64; 2]", into = "[u64; 2]")]
pub struct GreenWindow {
    /// First green frame.
    pub start: u64,
    /// First frame after the green phase.
    pub end: u64,
}

impl GreenWindow {
    /// Build a window.
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

impl From<[u64; 2]> for GreenWindow {
    fn from(v: [u64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<GreenWindow> for [u64; 2] {
    fn from(w: GreenWindow) -> Self {
        [w.start, w.end]
    }
}

/// Mapping from light id to its ordered green windows.
///
/// Serialized transparently as `{"ID-2": [[1020, 2250], ...], ...}`, which is the format the
/// annotation tooling has always written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightSchedule {
    windows: BTreeMap<String, Vec<GreenWindow>>,
}

impl LightSchedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the windows of `light`.
    pub fn insert(&mut self, light: impl Into<String>, windows: Vec<GreenWindow>) {
        self.windows.insert(light.into(), windows);
    }

    /// Append one window to `light`.
    pub fn push(&mut self, light: impl Into<String>, window: GreenWindow) {
        self.windows.entry(light.into()).or_default().push(window);
    }

    /// Windows for `light`, empty for unknown ids.
    pub fn windows(&self, light: &str) -> &[GreenWindow] {
        self.windows.get(light).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Light ids in lexical order.
    pub fn lights(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    /// Return `true` when `light` has an entry.
    pub fn contains(&self, light: &str) -> bool {
        self.windows.contains_key(light)
    }

    /// Parse a schedule from JSON.
    pub fn from_json(s: &str) -> OverlayResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| OverlayError::serde(format!("parse light schedule JSON: {e}")))
    }

    /// Check window ordering.
    ///
    /// Windows with `end < start` or out-of-order starts are rejected. Windows whose clearance
    /// bands overlap a neighbour are accepted (the first matching window wins) but logged.
    pub fn validate(&self, transition_frames: u64) -> OverlayResult<()> {
        for (light, windows) in &self.windows {
            for w in windows {
                if w.end < w.start {
                    return Err(OverlayError::validation(format!(
                        "schedule '{light}': window [{}, {}) ends before it starts",
                        w.start, w.end
                    )));
                }
            }
            for pair in windows.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if b.start < a.start {
                    return Err(OverlayError::validation(format!(
                        "schedule '{light}': windows must be sorted by start ({} after {})",
                        b.start, a.start
                    )));
                }
                let a_clear = a.end.saturating_add(transition_frames);
                let b_clear = b.start.saturating_sub(transition_frames);
                if a_clear > b_clear {
                    tracing::warn!(
                        light = %light,
                        prev_end = a.end,
                        next_start = b.start,
                        transition_frames,
                        "clearance bands of neighbouring green windows overlap"
                    );
                }
            }
        }
        Ok(())
    }
}

/// The three lamps of a signal head.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PanelLamps {
    /// Red lamp lit.
    pub red: bool,
    /// Yellow lamp lit.
    pub yellow: bool,
    /// Green lamp lit.
    pub green: bool,
}

impl From<LightState> for PanelLamps {
    fn from(s: LightState) -> Self {
        Self {
            red: s == LightState::Red,
            yellow: s == LightState::Yellow,
            green: s == LightState::Green,
        }
    }
}

/// Resolves light states from a [`LightSchedule`] and a transition window.
///
/// For each green window `[s, e)` of a light, scanned in order:
///
/// - `s - Y < f < s` is the pre-green clearance (`Yellow`),
/// - `s <= f < e` is `Green`,
/// - `e <= f < e + Y` is the post-green clearance (`Yellow`).
///
/// The first window that matches wins. No match (or an unknown light) is `Red`.
#[derive(Clone, Debug)]
pub struct ScheduleClock {
    schedule: LightSchedule,
    transition_frames: u64,
    pre_green: bool,
}

impl ScheduleClock {
    /// Build a clock with transition window `transition_frames` (`Y`).
    pub fn new(schedule: LightSchedule, transition_frames: u64) -> Self {
        Self {
            schedule,
            transition_frames,
            pre_green: true,
        }
    }

    /// Enable or disable the pre-green clearance band (enabled by default).
    pub fn with_pre_green(mut self, enabled: bool) -> Self {
        self.pre_green = enabled;
        self
    }

    /// The schedule this clock reads.
    pub fn schedule(&self) -> &LightSchedule {
        &self.schedule
    }

    /// Transition window length in frames.
    pub fn transition_frames(&self) -> u64 {
        self.transition_frames
    }

    /// State of `light` at `frame`. Total: never fails.
    ///
    /// For a window `[s, e)` and transition length `Y`: Green on `[s, e)`, Yellow on
    /// `[e, e + Y)`, and Yellow on the pre-green band `s - Y < f < s`. That band is `Y - 1`
    /// frames long, so with `Y = 1` frame `s - 1` is Red.
    pub fn state(&self, light: &str, frame: FrameIndex) -> LightState {
        let f = frame.0;
        let y = self.transition_frames;
        for w in self.schedule.windows(light) {
            // With s < Y the clearance band starts before frame 0.
            let pre_green = self.pre_green
                && f < w.start
                && w.start.checked_sub(y).is_none_or(|lo| f > lo);
            if pre_green {
                return LightState::Yellow;
            }
            if w.start <= f && f < w.end {
                return LightState::Green;
            }
            if w.end <= f && f < w.end.saturating_add(y) {
                return LightState::Yellow;
            }
        }
        LightState::Red
    }

    /// Lamp pattern of `light` at `frame`.
    pub fn panel(&self, light: &str, frame: FrameIndex) -> PanelLamps {
        self.state(light, frame).into()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/clock.rs"]
mod tests;
