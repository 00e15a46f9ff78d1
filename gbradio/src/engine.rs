//! Audio engine seam
//!
//! The core never talks to a sound card directly. Everything it needs from an
//! audio backend is expressed by [`AudioEngine`]: create a playable resource
//! from a URL, pause it, resume it, release it. Each call except `release` is
//! asynchronous and may fail.

use async_trait::async_trait;

use crate::error::EngineError;

/// Options applied once, at startup, to the platform audio session.
///
/// These only matter on hosts that have a notion of audio session categories
/// (mobile platforms); desktop engines are free to log and ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSessionOptions {
    /// Keep playing when the application goes to the background
    pub background_playback: bool,
    /// Lower other applications' volume instead of interrupting them
    pub duck_others: bool,
    /// Whether the session may record
    pub allow_recording: bool,
    /// Route playback through the earpiece instead of the speaker
    pub play_through_earpiece: bool,
}

impl Default for AudioSessionOptions {
    fn default() -> Self {
        Self {
            background_playback: true,
            duck_others: true,
            allow_recording: false,
            play_through_earpiece: false,
        }
    }
}

/// Options for [`AudioEngine::create_from_url`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    /// Start playing as soon as the resource is ready
    pub auto_start: bool,
    /// Restart from the beginning at end of stream
    pub looping: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            looping: false,
        }
    }
}

/// Asynchronous, fallible audio backend.
///
/// `Handle` is the opaque playable resource. The controller holds at most one
/// handle at a time and hands it back through [`release`](Self::release)
/// exactly once.
#[async_trait]
pub trait AudioEngine: Send + Sync + 'static {
    /// Opaque playable resource
    type Handle: Send + Sync + 'static;

    /// Apply the platform audio session mode.
    async fn configure_session(&self, options: &AudioSessionOptions) -> Result<(), EngineError> {
        tracing::debug!(?options, "Audio session options ignored by this engine");
        Ok(())
    }

    /// Create a playable resource bound to `url`.
    async fn create_from_url(
        &self,
        url: &str,
        options: CreateOptions,
    ) -> Result<Self::Handle, EngineError>;

    /// Pause playback of `handle`.
    async fn pause(&self, handle: &Self::Handle) -> Result<(), EngineError>;

    /// Resume playback of `handle`.
    async fn resume(&self, handle: &Self::Handle) -> Result<(), EngineError>;

    /// Release `handle` and every native resource behind it.
    fn release(&self, handle: Self::Handle);
}
