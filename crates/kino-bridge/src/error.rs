//! Error types for Kino Bridge

use crate::types::TextureId;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum Error {
    // Host errors
    #[error("video_player plugin requires a foreground activity")]
    NoHostContext,

    #[error("No video player associated with texture id {texture_id}")]
    UnknownHandle { texture_id: TextureId },

    #[error("Texture {texture_id} is already bound to a live player")]
    HandleCollision { texture_id: TextureId },

    // Request errors
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Unsupported format hint: {0}")]
    UnsupportedFormat(String),

    // Playback errors
    #[error("Video player had error {0}")]
    Engine(String),

    #[error("Invalid player state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Analytics errors
    #[error("Analytics error: {0}")]
    Analytics(String),

    // Internal errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing argument error
    pub fn missing_argument(name: impl Into<String>) -> Self {
        Self::invalid_argument(name, "argument is required")
    }

    /// Returns the short code reported to the host
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NoHostContext => "no_activity",
            Error::UnknownHandle { .. } => "Unknown textureId",
            Error::HandleCollision { .. } => "texture_collision",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Engine(_) => "VideoError",
            Error::InvalidStateTransition { .. } => "invalid_state",
            Error::Analytics(_) => "analytics_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(Error::NoHostContext.error_code(), "no_activity");
        assert_eq!(
            Error::UnknownHandle { texture_id: TextureId(3) }.error_code(),
            "Unknown textureId"
        );
        assert_eq!(Error::Engine("boom".into()).error_code(), "VideoError");
    }

    #[test]
    fn test_messages() {
        let err = Error::UnknownHandle { texture_id: TextureId(7) };
        assert_eq!(err.to_string(), "No video player associated with texture id 7");
        assert_eq!(
            Error::Engine("Source error".into()).to_string(),
            "Video player had error Source error"
        );
        assert_eq!(
            Error::NoHostContext.to_string(),
            "video_player plugin requires a foreground activity"
        );
    }
}
