//! Error types for the radio core
//!
//! Neither error ever leaves the core: the playback controller folds
//! [`EngineError`] into a definite [`PlaybackState`](crate::PlaybackState)
//! and the metadata poller folds [`FetchError`] into the fallback title.

/// Failures reported by an [`AudioEngine`](crate::AudioEngine)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The stream could not be reached or the connection dropped
    #[error("stream unreachable: {0}")]
    Network(String),

    /// The stream was reached but its content could not be decoded
    #[error("cannot decode stream: {0}")]
    Decode(String),

    /// No usable audio output device
    #[error("audio device error: {0}")]
    Device(String),

    /// The playable resource has already been released
    #[error("playback resource closed")]
    Closed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Failures while fetching the now-playing title
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("metadata endpoint returned status {0}")]
    Status(u16),

    /// Timeout error
    #[error("metadata request timeout")]
    Timeout,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EngineError::Decode("no audio track".into()).to_string(),
            "cannot decode stream: no audio track"
        );
        assert_eq!(EngineError::Closed.to_string(), "playback resource closed");
        assert_eq!(
            FetchError::Status(503).to_string(),
            "metadata endpoint returned status 503"
        );
        assert_eq!(FetchError::other("boom").to_string(), "boom");
    }
}
