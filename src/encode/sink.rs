use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::frame::FrameRGBA;
use std::path::PathBuf;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
}

/// Sink contract for consuming composited frames.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order. `end` is
/// called exactly once after `begin`, including when a run is cancelled or the source fails.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> OverlayResult<()>;
    /// Push one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> OverlayResult<()>;
    /// Flush and close.
    fn end(&mut self) -> OverlayResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    ended: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Captured frames in push order.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// Whether `end` has been called since the last `begin`.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> OverlayResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> OverlayResult<()> {
        if let Some((last, _)) = self.frames.last()
            && idx <= *last
        {
            return Err(OverlayError::encode("in-memory sink received out-of-order frame index"));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> OverlayResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Writes each frame as `<dir>/<prefix><index>.png`, index zero-padded to six digits.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    prefix: String,
    cfg: Option<SinkConfig>,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            cfg: None,
            written: 0,
        }
    }

    /// Path a frame is written to.
    pub fn frame_path(&self, idx: FrameIndex) -> PathBuf {
        self.dir.join(format!("{}{:06}.png", self.prefix, idx.0))
    }

    /// Frames written since `begin`.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> OverlayResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            OverlayError::encode(format!(
                "create output directory '{}': {e}",
                self.dir.display()
            ))
        })?;
        self.cfg = Some(cfg);
        self.written = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> OverlayResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| OverlayError::encode("png sink not started"))?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(OverlayError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        let path = self.frame_path(idx);
        frame
            .to_rgba_image()?
            .save(&path)
            .map_err(|e| OverlayError::encode(format!("write '{}': {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> OverlayResult<()> {
        self.cfg = None;
        tracing::debug!(dir = %self.dir.display(), frames = self.written, "png sequence closed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
