/// Result alias used across the crate.
pub type VeilcutResult<T> = Result<T, VeilcutError>;

/// Errors surfaced by decode sessions, the compositor and the export pipeline.
///
/// Per-frame decode hiccups never show up here; they are logged and absorbed by the caller loop.
#[derive(thiserror::Error, Debug)]
pub enum VeilcutError {
    /// Invalid options or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Session-level decode failure (unopenable input, no video stream, no decoder).
    #[error("decode error: {0}")]
    Decode(String),

    /// Encoder or muxer failure with no usable fallback.
    #[error("encode error: {0}")]
    Encode(String),

    /// Buffer allocation failed.
    #[error("resource exhausted: {0}")]
    Resource(String),

    /// Mask/track (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Raw libav error.
    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    /// Anything else, usually file-system errors with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VeilcutError {
    /// Build a [`VeilcutError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`VeilcutError::Decode`].
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`VeilcutError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`VeilcutError::Resource`].
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`VeilcutError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
