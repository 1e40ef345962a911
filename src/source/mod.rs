//! Frame sources: where decoded frames come from.

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::frame::FrameRGBA;
use std::collections::VecDeque;

/// Video decoding through the system `ffmpeg`/`ffprobe`.
pub mod ffmpeg;
/// Directory of still images.
pub mod images;

/// Size and rate of a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub canvas: Canvas,
    pub fps: Fps,
}

/// Produces decoded frames in order.
///
/// `Ok(None)` is the normal end of stream. An `Err` means the source could not supply a
/// decodable frame and the run must stop.
pub trait FrameSource: Send {
    /// Frame size and rate.
    fn info(&self) -> SourceInfo;
    /// Decode the next frame.
    fn next_frame(&mut self) -> OverlayResult<Option<FrameRGBA>>;
}

/// Pre-decoded frames, mostly for tests.
#[derive(Debug)]
pub struct InMemorySource {
    info: SourceInfo,
    frames: VecDeque<FrameRGBA>,
    fail_after: Option<usize>,
    served: usize,
}

impl InMemorySource {
    /// All frames must share the size of the first one.
    pub fn new(frames: Vec<FrameRGBA>, fps: Fps) -> OverlayResult<Self> {
        let first = frames
            .first()
            .ok_or_else(|| OverlayError::validation("in-memory source needs at least one frame"))?;
        let canvas = first.canvas();
        if frames.iter().any(|f| f.canvas() != canvas) {
            return Err(OverlayError::validation(
                "in-memory source frames must share one size",
            ));
        }
        Ok(Self {
            info: SourceInfo { canvas, fps },
            frames: frames.into(),
            fail_after: None,
            served: 0,
        })
    }

    /// Report a decode error instead of frame `n + 1` (after serving `n` frames).
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl FrameSource for InMemorySource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> OverlayResult<Option<FrameRGBA>> {
        if self.fail_after == Some(self.served) {
            return Err(OverlayError::source(format!(
                "frame {} could not be decoded",
                self.served + 1
            )));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.served += 1;
        }
        Ok(frame)
    }
}

/// Decode and return the frame at zero-based position `n` of `source`.
pub fn capture_frame(source: &mut dyn FrameSource, n: u64) -> OverlayResult<FrameRGBA> {
    let mut seen = 0u64;
    while let Some(frame) = source.next_frame()? {
        if seen == n {
            return Ok(frame);
        }
        seen += 1;
    }
    Err(OverlayError::source(format!(
        "source ended after {seen} frames, cannot capture frame {n}"
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/source/mod.rs"]
mod tests;
