//! Intersight stabilizes a drone view of road intersections against a fixed calibration and
//! overlays traffic-control state onto every frame.
//!
//! Per frame the engine:
//!
//! - tracks the camera against a single reference image ([`HomographyTracker`]),
//! - reprojects each intersection's boundary, crossing line and occlusion masks,
//! - colors the crossing line from a frame-indexed light schedule ([`ScheduleClock`]),
//! - draws light panels and a frame stamp, then pushes the frame into a [`FrameSink`].
//!
//! The public API is session-oriented: load a [`Scene`], create an [`OverlaySession`] and
//! [`OverlaySession::run`] it over a [`FrameSource`].
#![forbid(unsafe_code)]

mod foundation;

/// Calibration scene model and the annotation state machine.
pub mod calibration;
pub mod classify;
/// Output sinks.
pub mod encode;
pub mod geometry;
/// Frames, the overlay canvas and overlay layers.
pub mod render;
pub mod schedule;
/// Per-frame orchestration, sticky transforms and reports.
pub mod session;
pub mod source;
pub mod tracking;

pub use crate::foundation::core::{
    BezPath, Canvas, Fps, FrameIndex, Point, Rect, Rgb8, Vec2,
};
pub use crate::foundation::error::{OverlayError, OverlayResult};

pub use crate::calibration::annotate::{AnnotationState, CalibrationDraft, InputEvent, handle_event};
pub use crate::calibration::scene::{Intersection, MaskPolygon, MaskSpace, OverlayPolicy, Scene};
pub use crate::classify::violation::{
    Classification, ClassifierPolicy, CrossingColor, SignalTopology, SplitRule, YellowPolicy,
};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, PngSequenceSink, SinkConfig};
pub use crate::geometry::homography::{Homography, HomographyError, RansacConfig};
pub use crate::geometry::projector::{CrossingLine, ProjectedPolygon};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::lights::{ArrowSet, LightPanel};
pub use crate::schedule::clock::{GreenWindow, LightSchedule, LightState, ScheduleClock};
pub use crate::schedule::cycle::CyclePlan;
pub use crate::session::orchestrator::{
    CancelToken, FrameCursor, OverlaySession, RunStats, ScheduleMode, SessionOpts,
};
pub use crate::session::report::{FrameReport, ReportWriter, SkipReason, TrackingStatus};
pub use crate::session::sticky::{ComposedTransform, FallbackPolicy, StickyTransforms};
pub use crate::source::ffmpeg::FfmpegSource;
pub use crate::source::images::ImageSequenceSource;
pub use crate::source::{FrameSource, InMemorySource, SourceInfo};
pub use crate::tracking::tracker::{
    HomographyTracker, MotionEstimator, TrackedMotion, TrackerConfig, TrackingFailure,
};
