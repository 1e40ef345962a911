use crate::foundation::core::FrameIndex;
use crate::schedule::clock::{LightState, ScheduleClock};
use serde::{Deserialize, Serialize};

/// How an intersection's approach is signalled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTopology {
    /// One light for the whole approach.
    Single {
        /// Light id in the schedule.
        light: String,
    },
    /// Separate forward and left-turn lights.
    Split {
        /// Forward light id.
        forward: String,
        /// Left-turn light id.
        left: String,
    },
}

impl SignalTopology {
    /// Single light named `light`.
    pub fn single(light: impl Into<String>) -> Self {
        Self::Single {
            light: light.into(),
        }
    }

    /// Split signal with the conventional `<id>-F` / `<id>-L` light ids.
    pub fn split_for(id: &str) -> Self {
        Self::Split {
            forward: format!("{id}-F"),
            left: format!("{id}-L"),
        }
    }

    /// Light ids with their roles, forward first.
    pub fn lights(&self) -> Vec<(SignalRole, &str)> {
        match self {
            Self::Single { light } => vec![(SignalRole::Whole, light.as_str())],
            Self::Split { forward, left } => vec![
                (SignalRole::Forward, forward.as_str()),
                (SignalRole::Left, left.as_str()),
            ],
        }
    }
}

/// Which movement a sub-signal controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRole {
    /// The only light of a single-signal approach.
    Whole,
    /// Through movement.
    Forward,
    /// Left turn.
    Left,
}

/// Whether yellow counts as passable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YellowPolicy {
    /// Yellow may still be crossed.
    #[default]
    Pass,
    /// Yellow is treated like red.
    Stop,
}

/// How two sub-signal states combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// Stop only when both sub-signals are red.
    #[default]
    AllRedStops,
    /// Pass when at least one sub-signal is passable under the yellow policy.
    AnyPassable,
}

/// Classifier configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    /// Yellow handling.
    pub yellow: YellowPolicy,
    /// Split-signal combination.
    pub split: SplitRule,
}

impl ClassifierPolicy {
    fn passable(&self, s: LightState) -> bool {
        match s {
            LightState::Green => true,
            LightState::Yellow => self.yellow == YellowPolicy::Pass,
            LightState::Red => false,
        }
    }
}

/// Crossing-line color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingColor {
    /// Crossing is allowed.
    Pass,
    /// Crossing is a violation.
    Stop,
}

/// Raw state of one sub-signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubSignalState {
    /// Sub-signal role.
    pub role: SignalRole,
    /// Light id.
    pub light: String,
    /// State at the classified frame.
    pub state: LightState,
}

/// Resolved color plus the sub-states it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Resolved color.
    pub color: CrossingColor,
    /// Sub-signal states, forward first.
    pub states: Vec<SubSignalState>,
}

/// Resolve the crossing color from already-known sub-signal states.
pub fn resolve(states: &[LightState], policy: &ClassifierPolicy) -> CrossingColor {
    let pass = match states {
        [] => false,
        [single] => policy.passable(*single),
        many => match policy.split {
            SplitRule::AllRedStops => !many.iter().all(|s| *s == LightState::Red),
            SplitRule::AnyPassable => many.iter().any(|s| policy.passable(*s)),
        },
    };
    if pass {
        CrossingColor::Pass
    } else {
        CrossingColor::Stop
    }
}

/// Look up every sub-signal of `topology` at `frame` and classify.
pub fn classify(
    topology: &SignalTopology,
    clock: &ScheduleClock,
    frame: FrameIndex,
    policy: &ClassifierPolicy,
) -> Classification {
    let states: Vec<SubSignalState> = topology
        .lights()
        .into_iter()
        .map(|(role, light)| SubSignalState {
            role,
            light: light.to_string(),
            state: clock.state(light, frame),
        })
        .collect();
    let raw: Vec<LightState> = states.iter().map(|s| s.state).collect();
    Classification {
        color: resolve(&raw, policy),
        states,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/classify/violation.rs"]
mod tests;
