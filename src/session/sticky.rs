use crate::foundation::core::FrameIndex;
use crate::geometry::homography::Homography;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do when a frame's transform cannot be estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Reuse the last good transform, marked stale.
    #[default]
    ReuseStale,
    /// Skip the affected geometry for this frame.
    SkipOnFailure,
}

/// Which sticky cell a transform lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransformKey {
    /// The relative reference-to-frame transform used for reference-space masks.
    Global,
    /// An intersection's composed transform.
    Intersection(String),
}

/// A transform ready for drawing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ComposedTransform {
    pub homography: Homography,
    /// `true` when reused from an earlier frame.
    pub stale: bool,
    /// Frame the transform was estimated on.
    pub source_frame: FrameIndex,
}

/// Last good transform per key.
///
/// Owned by the orchestrator and only touched in frame order.
#[derive(Clone, Debug, Default)]
pub struct StickyTransforms {
    cells: HashMap<TransformKey, (Homography, FrameIndex)>,
}

impl StickyTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh transform for `frame` and return it.
    pub fn update(
        &mut self,
        key: TransformKey,
        homography: Homography,
        frame: FrameIndex,
    ) -> ComposedTransform {
        self.cells.insert(key, (homography, frame));
        ComposedTransform {
            homography,
            stale: false,
            source_frame: frame,
        }
    }

    /// Transform to use when estimation failed this frame.
    pub fn fallback(&self, key: &TransformKey, policy: FallbackPolicy) -> Option<ComposedTransform> {
        match policy {
            FallbackPolicy::SkipOnFailure => None,
            FallbackPolicy::ReuseStale => self.cells.get(key).map(|&(homography, source_frame)| {
                ComposedTransform {
                    homography,
                    stale: true,
                    source_frame,
                }
            }),
        }
    }

    /// Either record `fresh` or fall back.
    pub fn resolve(
        &mut self,
        key: TransformKey,
        fresh: Option<Homography>,
        frame: FrameIndex,
        policy: FallbackPolicy,
    ) -> Option<ComposedTransform> {
        match fresh {
            Some(h) => Some(self.update(key, h, frame)),
            None => self.fallback(&key, policy),
        }
    }

    /// Last good transform for `key`, if any.
    pub fn last(&self, key: &TransformKey) -> Option<(Homography, FrameIndex)> {
        self.cells.get(key).copied()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/sticky.rs"]
mod tests;
