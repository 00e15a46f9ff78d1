//! # gbradio - Gurbani 24/7 radio core
//!
//! `gbradio` holds the state that matters in the Gurbani 24/7 player: whether
//! audio is playing, and what is being played. Audio output and HTTP are
//! reached through two small traits so the core can be driven by fakes in
//! tests and by real backends in the application.
//!
//! ## Components
//!
//! - [`PlaybackController`]: owns the single playable resource and the
//!   [`PlaybackState`]. One entry point, [`PlaybackController::toggle`].
//! - [`MetadataPoller`]: fetches the current title on a fixed interval and
//!   publishes it.
//! - [`RadioSession`]: both of the above, plus startup and teardown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use gbradio::{AudioEngine, HttpTitleSource, RadioSession, RadioSettings};
//!
//! async fn run<E: AudioEngine>(engine: Arc<E>) -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RadioSettings::default();
//!     let source = Arc::new(HttpTitleSource::new(settings.metadata_url.clone())?);
//!     let session = RadioSession::new(engine, source, &settings);
//!
//!     session.start().await;
//!     session.toggle().await;
//!     println!("{} ({})", session.current_title(), session.playback_state());
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Errors exist ([`EngineError`], [`FetchError`]) but never leave the core:
//! a failed engine call lands in [`PlaybackState::Paused`], a failed fetch
//! publishes [`FALLBACK_TITLE`].

pub mod engine;
pub mod error;
pub mod metadata;
pub mod playback;
pub mod session;

pub use engine::{AudioEngine, AudioSessionOptions, CreateOptions};
pub use error::{EngineError, FetchError};
pub use metadata::{
    DEFAULT_POLL_INTERVAL, DEFAULT_TITLE, FALLBACK_TITLE, HttpTitleSource, MetadataPoller,
    TitleSource, resolve_title,
};
pub use playback::{PlaybackController, PlaybackState};
pub use session::{DEFAULT_METADATA_URL, DEFAULT_STREAM_URL, RadioSession, RadioSettings};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
