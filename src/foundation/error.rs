/// Result alias used across the crate.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Crate-wide error type.
///
/// Per-frame failures (tracking loss, degenerate projections, schedule gaps) are not errors: they
/// surface as markers in [`crate::FrameReport`]. Only configuration problems and I/O failures on
/// the frame source or sink reach the caller as an `OverlayError`.
#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    /// Invalid configuration or input data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Scene calibration data is missing or inconsistent.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// The frame source could not supply a decodable frame.
    #[error("frame source error: {0}")]
    Source(String),

    /// The output sink failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OverlayError {
    /// Build an [`OverlayError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build an [`OverlayError::Calibration`].
    pub fn calibration(msg: impl Into<String>) -> Self {
        Self::Calibration(msg.into())
    }

    /// Build an [`OverlayError::Source`].
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Build an [`OverlayError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build an [`OverlayError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
