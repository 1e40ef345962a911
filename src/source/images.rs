use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::frame::FrameRGBA;
use crate::source::{FrameSource, SourceInfo};
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Still images from a directory, in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    info: SourceInfo,
}

impl ImageSequenceSource {
    /// List `dir` and read the first image to learn the frame size.
    pub fn from_dir(dir: impl AsRef<Path>, fps: Fps) -> OverlayResult<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            OverlayError::source(format!("read image directory '{}': {e}", dir.display()))
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();
        Self::from_paths(paths, fps)
    }

    /// Use an explicit list of image paths.
    pub fn from_paths(paths: Vec<PathBuf>, fps: Fps) -> OverlayResult<Self> {
        let first = paths
            .first()
            .ok_or_else(|| OverlayError::source("image sequence is empty"))?;
        let (width, height) = image::image_dimensions(first).map_err(|e| {
            OverlayError::source(format!("read image '{}': {e}", first.display()))
        })?;
        Ok(Self {
            paths,
            next: 0,
            info: SourceInfo {
                canvas: Canvas { width, height },
                fps,
            },
        })
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> OverlayResult<Option<FrameRGBA>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let frame = FrameRGBA::from_path(path)?;
        if frame.canvas() != self.info.canvas {
            return Err(OverlayError::source(format!(
                "image '{}' is {}x{}, sequence is {}x{}",
                path.display(),
                frame.width,
                frame.height,
                self.info.canvas.width,
                self.info.canvas.height
            )));
        }
        Ok(Some(frame))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/images.rs"]
mod tests;
