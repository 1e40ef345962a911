//! Output sinks.
//!
//! Sinks consume composited frames in source order and are driven by
//! `OverlaySession::run`.

/// `ffmpeg`-based MP4 output.
pub mod ffmpeg;
/// Frame sink trait and the file/in-memory sinks.
pub mod sink;
