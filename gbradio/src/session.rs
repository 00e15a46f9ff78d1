//! One listening session: the playback controller and the title poller,
//! composed by ownership.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{AudioEngine, AudioSessionOptions};
use crate::metadata::{
    DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TITLE, FALLBACK_TITLE,
    MetadataPoller, TitleSource,
};
use crate::playback::{PlaybackController, PlaybackState};

/// Gurbani Kirtan live stream
pub const DEFAULT_STREAM_URL: &str = "https://gurbanikirtan.radioca.st/start.mp3";

/// Plain-text "current song" endpoint of the same station
pub const DEFAULT_METADATA_URL: &str = "https://gurbanikirtan.radioca.st/currentsong?sid=1";

/// Everything a session needs to know about the station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioSettings {
    pub stream_url: String,
    pub metadata_url: String,
    pub poll_interval: Duration,
    pub metadata_timeout: Duration,
    pub initial_title: String,
    pub fallback_title: String,
    pub audio_session: AudioSessionOptions,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            metadata_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            initial_title: DEFAULT_TITLE.to_string(),
            fallback_title: FALLBACK_TITLE.to_string(),
            audio_session: AudioSessionOptions::default(),
        }
    }
}

/// A running radio: exactly one controller and one poller.
///
/// Build a fresh session per process (or per test); dropping it releases the
/// audio resource.
pub struct RadioSession<E: AudioEngine, S: TitleSource> {
    controller: Arc<PlaybackController<E>>,
    poller: MetadataPoller<S>,
    audio_session: AudioSessionOptions,
    shut_down: AtomicBool,
}

impl<E: AudioEngine, S: TitleSource> RadioSession<E, S> {
    pub fn new(engine: Arc<E>, source: Arc<S>, settings: &RadioSettings) -> Self {
        let controller = PlaybackController::new(engine, settings.stream_url.clone());
        let poller = MetadataPoller::with_settings(
            source,
            settings.poll_interval,
            settings.initial_title.clone(),
            settings.fallback_title.clone(),
        );

        Self {
            controller: Arc::new(controller),
            poller,
            audio_session: settings.audio_session,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Apply the audio session mode, then start polling the title.
    pub async fn start(&self) {
        if let Err(err) = self
            .controller
            .engine()
            .configure_session(&self.audio_session)
            .await
        {
            warn!("Cannot configure audio session: {}", err);
        }
        self.poller.start();
        info!(url = %self.controller.stream_url(), "Radio session started");
    }

    /// Shared handle on the controller, for spawning toggles.
    pub fn controller(&self) -> &Arc<PlaybackController<E>> {
        &self.controller
    }

    pub fn poller(&self) -> &MetadataPoller<S> {
        &self.poller
    }

    pub async fn toggle(&self) {
        self.controller.toggle().await;
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn current_title(&self) -> String {
        self.poller.current_title()
    }

    /// Stop polling and release the audio resource. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.poller.stop();
        self.controller.teardown();
        info!("Radio session closed");
    }
}

impl<E: AudioEngine, S: TitleSource> Drop for RadioSession<E, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
