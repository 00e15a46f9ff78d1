//! Playback state machine
//!
//! [`PlaybackController`] owns the single playable resource of a session and
//! the one "is audio playing" truth shown to the rest of the application.
//!
//! ## Transitions
//!
//! ```text
//!            toggle                create ok
//!   Idle ─────────────► Loading ─────────────► Playing
//!                          │                    │   ▲
//!              create err  │            toggle  │   │ resume ok
//!                          ▼                    ▼   │
//!                        Paused ◄──────────── Loading
//!                          │      pause ok/err,
//!                          │      resume err
//!                          └── toggle ──► Loading (create again if no handle,
//!                                                 resume otherwise)
//! ```
//!
//! `Loading` is published before every engine call starts and replaced only
//! once the call has resolved. A `toggle()` arriving while `Loading` is
//! ignored, so at most one engine call is ever in flight.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::{AudioEngine, CreateOptions};

/// Playback state as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing was ever requested
    #[default]
    Idle,
    /// An engine call is in flight
    Loading,
    /// Audio is playing
    Playing,
    /// Audio is stopped (paused, or the last request failed)
    Paused,
}

impl PlaybackState {
    /// Returns true for the states an engine call can settle into.
    pub fn is_settled(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Engine call decided under the lock, executed outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Create,
    Pause,
    Resume,
}

/// An engine call started by `toggle`.
///
/// Owns the lent handle for the duration of the call. If the toggle future
/// is dropped before the call resolves, the drop settles the controller in
/// `Paused` and gives the handle back (or releases it after teardown).
struct InFlight<'a, E: AudioEngine> {
    controller: &'a PlaybackController<E>,
    handle: Option<E::Handle>,
    settled: bool,
}

impl<E: AudioEngine> InFlight<'_, E> {
    fn finish(mut self, next: PlaybackState) {
        self.settled = true;
        let handle = self.handle.take();
        self.controller.settle(handle, next);
    }
}

impl<E: AudioEngine> Drop for InFlight<'_, E> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Engine call abandoned, settling paused");
            let handle = self.handle.take();
            self.controller.settle(handle, PlaybackState::Paused);
        }
    }
}

struct Slot<H> {
    /// The live resource, when not lent to an in-flight call
    handle: Option<H>,
    /// True while the handle is out for a pause/resume call
    lent: bool,
    /// Set by `teardown`; late handles are released instead of stored
    closed: bool,
}

/// Owner of the playable resource and of the playback state.
pub struct PlaybackController<E: AudioEngine> {
    engine: Arc<E>,
    stream_url: String,
    slot: Mutex<Slot<E::Handle>>,
    state: watch::Sender<PlaybackState>,
}

impl<E: AudioEngine> PlaybackController<E> {
    /// Create an idle controller bound to `stream_url`.
    pub fn new(engine: Arc<E>, stream_url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            engine,
            stream_url: stream_url.into(),
            slot: Mutex::new(Slot {
                handle: None,
                lent: false,
                closed: false,
            }),
            state,
        }
    }

    /// The stream this controller plays
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// The engine this controller drives
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state() == PlaybackState::Loading
    }

    /// Returns true when a playable resource exists, including while it is
    /// lent to an in-flight pause/resume call.
    pub fn has_handle(&self) -> bool {
        let slot = self.slot.lock();
        slot.handle.is_some() || slot.lent
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// Flip playback: create the resource on first use, then alternate
    /// between pause and resume.
    ///
    /// Never fails: engine errors settle the state into `Paused`.
    pub async fn toggle(&self) {
        let (request, mut call) = {
            let mut slot = self.slot.lock();
            if slot.closed {
                debug!("toggle ignored, controller torn down");
                return;
            }

            let current = self.state();
            if current == PlaybackState::Loading {
                debug!("toggle ignored, engine call already in flight");
                return;
            }

            let handle = slot.handle.take();
            let request = match handle {
                None => Request::Create,
                Some(_) if current == PlaybackState::Playing => Request::Pause,
                Some(_) => Request::Resume,
            };
            slot.lent = handle.is_some();
            self.publish(PlaybackState::Loading);
            let call = InFlight {
                controller: self,
                handle,
                settled: false,
            };
            (request, call)
        };

        let next = match (request, call.handle.as_ref()) {
            (Request::Pause, Some(handle)) => {
                if let Err(err) = self.engine.pause(handle).await {
                    // On considère la lecture arrêtée quoi qu'il arrive
                    warn!("Pause failed, assuming stopped: {}", err);
                }
                PlaybackState::Paused
            }
            (Request::Resume, Some(handle)) => match self.engine.resume(handle).await {
                Ok(()) => PlaybackState::Playing,
                Err(err) => {
                    warn!("Resume failed: {}", err);
                    PlaybackState::Paused
                }
            },
            _ => {
                info!(url = %self.stream_url, "Creating playback resource");
                match self
                    .engine
                    .create_from_url(&self.stream_url, CreateOptions::default())
                    .await
                {
                    Ok(handle) => {
                        call.handle = Some(handle);
                        PlaybackState::Playing
                    }
                    Err(err) => {
                        warn!(url = %self.stream_url, "Cannot start stream: {}", err);
                        PlaybackState::Paused
                    }
                }
            }
        };

        call.finish(next);
    }

    /// Release the resource, if any. Idempotent.
    ///
    /// A handle still out in an engine call is released when that call
    /// resolves.
    pub fn teardown(&self) {
        let handle = {
            let mut slot = self.slot.lock();
            slot.closed = true;
            slot.handle.take()
        };

        if let Some(handle) = handle {
            info!("Releasing playback resource");
            self.engine.release(handle);
        }
    }

    fn settle(&self, handle: Option<E::Handle>, next: PlaybackState) {
        let orphan = {
            let mut slot = self.slot.lock();
            slot.lent = false;
            self.publish(next);
            if slot.closed {
                handle
            } else {
                slot.handle = handle;
                None
            }
        };

        if let Some(handle) = orphan {
            info!("Releasing playback resource returned after teardown");
            self.engine.release(handle);
        }
    }

    fn publish(&self, next: PlaybackState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Playback state changed");
        }
    }
}

impl<E: AudioEngine> fmt::Debug for PlaybackController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("stream_url", &self.stream_url)
            .field("state", &self.state())
            .field("has_handle", &self.has_handle())
            .finish()
    }
}
