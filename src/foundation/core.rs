use crate::foundation::error::{OverlayError, OverlayResult};

pub use kurbo::{BezPath, Point, Rect, Vec2};

/// Absolute frame index in source-video order.
///
/// Frame numbering starts at the session's configured origin (1 by default, matching the
/// schedules produced during annotation).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// The following frame (saturating).
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame rate as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32,
}

impl Fps {
    /// Create a validated frame rate.
    pub fn new(num: u32, den: u32) -> OverlayResult<Self> {
        if den == 0 {
            return Err(OverlayError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(OverlayError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Parse `"30000/1001"` or `"25"` as reported by ffprobe.
    pub fn parse_ratio(s: &str) -> OverlayResult<Self> {
        let bad = || OverlayError::validation(format!("invalid frame rate '{s}'"));
        let (num, den) = match s.trim().split_once('/') {
            Some((n, d)) => (n.trim().parse().map_err(|_| bad())?, d.trim().parse().map_err(|_| bad())?),
            None => (s.trim().parse().map_err(|_| bad())?, 1),
        };
        Self::new(num, den)
    }

    /// Floating-point frames per second.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

/// Frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Number of bytes in one tightly packed RGBA8 frame of this size.
    pub fn rgba_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// Opaque 8-bit RGB color.
///
/// Serialized as a `[r, g, b]` array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb8 {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Rgb8 {
    /// Build a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const YELLOW: Self = Self::new(255, 255, 0);
}

impl From<[u8; 3]> for Rgb8 {
    fn from(v: [u8; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Rgb8> for [u8; 3] {
    fn from(c: Rgb8) -> Self {
        [c.r, c.g, c.b]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
