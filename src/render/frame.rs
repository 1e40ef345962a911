use crate::foundation::core::Canvas;
use crate::foundation::error::{OverlayError, OverlayResult};
use image::{GrayImage, RgbaImage};

/// A decoded or composited video frame.
///
/// Pixels are tightly packed, row-major, straight-alpha RGBA8. Frames from video sources are
/// fully opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Wrap raw bytes, checking the length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> OverlayResult<Self> {
        let expected = Canvas { width, height }.rgba_len();
        if data.len() != expected {
            return Err(OverlayError::validation(format!(
                "frame data has {} bytes, expected {expected} for {width}x{height} RGBA8",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with one opaque color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let px = [rgb[0], rgb[1], rgb[2], 255];
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(Canvas { width, height }.rgba_len())
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Take ownership of an `image` buffer.
    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    /// Load any still image format supported by `image`.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| {
            OverlayError::source(format!("decode image '{}': {e}", path.display()))
        })?;
        Ok(Self::from_rgba_image(img.to_rgba8()))
    }

    /// Copy into an `image` buffer.
    pub fn to_rgba_image(&self) -> OverlayResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| OverlayError::validation("frame data does not match its dimensions"))
    }

    /// Single-channel intensity.
    pub fn to_gray(&self) -> OverlayResult<GrayImage> {
        Ok(image::imageops::grayscale(&self.to_rgba_image()?))
    }

    /// Frame dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// RGBA of pixel `(x, y)`, `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}
