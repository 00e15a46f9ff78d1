//! # gbaudio - desktop audio engine for Gurbani 24/7
//!
//! [`StreamEngine`] implements [`gbradio::AudioEngine`] on top of:
//!
//! - **reqwest** to fetch the live HTTP stream,
//! - **symphonia** to decode it (MP3, AAC, Ogg, ...) on a worker thread,
//! - **rubato** to resample it to the device rate,
//! - **cpal** to play it on the default output device.
//!
//! ```text
//! HTTP ──► ChannelReader ──► StreamDecoder ──► FormatConverter ──► SharedBuffer ──► cpal
//!          (tokio task)      (decoder thread)                                      (output thread)
//! ```
//!
//! Pausing silences the device and lets the buffer fill; the network is then
//! throttled by backpressure. If the server drops the connection while
//! paused, resuming reconnects to the live stream.

pub mod convert;
pub mod decoder;
pub mod engine;
pub mod output;
pub mod reader;

pub use engine::{StreamEngine, StreamPlayer};
pub use output::OutputFormat;
