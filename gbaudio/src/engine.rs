//! [`AudioEngine`] implementation for desktop playback

use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use gbradio::{AudioEngine, AudioSessionOptions, CreateOptions, EngineError};

use crate::convert::FormatConverter;
use crate::decoder::{StreamDecoder, format_extension};
use crate::output::{BUFFER_SECONDS, OutputCommand, OutputFormat, SharedBuffer, spawn_output};
use crate::reader::{ByteStream, ChannelReader};

const USER_AGENT: &str = concat!("Gurbani247/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FULL_BUFFER_WAIT: Duration = Duration::from_millis(10);

/// Streams an HTTP audio URL to the default output device.
///
/// reqwest fetches, symphonia decodes on a worker thread, and cpal plays
/// from a dedicated output thread.
#[derive(Debug, Clone)]
pub struct StreamEngine {
    client: reqwest::Client,
}

impl StreamEngine {
    pub fn new() -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Open `url` and start a decoder thread feeding `buffer`.
    async fn open_stream(
        &self,
        url: &str,
        buffer: Arc<SharedBuffer>,
        output: OutputFormat,
    ) -> Result<Decoding, EngineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Network(format!(
                "HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let extension = format_extension(content_type.as_deref(), url);

        tracing::debug!(
            "Stream response: content-type={:?}, hint={:?}",
            content_type,
            extension
        );

        let stop = CancellationToken::new();
        let stream: ByteStream = response.bytes_stream().boxed();
        let reader = ChannelReader::new(stream, stop.clone());

        // Le sondage du format lit le flux de façon bloquante
        let probe = tokio::task::spawn_blocking(move || {
            StreamDecoder::open(reader, extension.as_deref())
        })
        .await
        .map_err(|e| EngineError::Decode(format!("Probe task failed: {}", e)));

        let decoder = match probe.and_then(|r| r) {
            Ok(decoder) => decoder,
            Err(e) => {
                stop.cancel();
                return Err(e);
            }
        };

        buffer.reopen();
        let thread_buffer = buffer.clone();
        let join = thread::Builder::new()
            .name("gurbani247-decoder".to_string())
            .spawn(move || decode_loop(decoder, thread_buffer, output))
            .map_err(|e| {
                stop.cancel();
                EngineError::Other(format!("Failed to spawn decoder thread: {}", e))
            })?;

        Ok(Decoding { stop, join })
    }
}

/// Worker decoding one HTTP response.
struct Decoding {
    stop: CancellationToken,
    join: JoinHandle<()>,
}

impl Decoding {
    fn cancel(self) {
        self.stop.cancel();
        // Le thread peut encore attendre une lecture réseau : on ne le joint pas
        drop(self.join);
    }
}

fn decode_loop(mut decoder: StreamDecoder, buffer: Arc<SharedBuffer>, output: OutputFormat) {
    let mut converter = match FormatConverter::new(
        decoder.sample_rate(),
        decoder.channels(),
        output.sample_rate,
        output.channels,
    ) {
        Ok(converter) => converter,
        Err(e) => {
            tracing::warn!("Cannot play stream format: {}", e);
            buffer.mark_end();
            return;
        }
    };

    loop {
        if buffer.is_stopped() {
            break;
        }

        if buffer.is_full() {
            thread::sleep(FULL_BUFFER_WAIT);
            continue;
        }

        match decoder.decode_next() {
            Ok(Some(samples)) => {
                let converted = converter
                    .reconfigure(decoder.sample_rate(), decoder.channels())
                    .and_then(|()| converter.convert(&samples));
                match converted {
                    Ok(converted) => buffer.push_samples(&converted),
                    Err(e) => {
                        tracing::warn!("Audio conversion failed: {}", e);
                        break;
                    }
                }
            }
            Ok(None) => {
                tracing::info!("Audio stream ended");
                break;
            }
            Err(e) => {
                if !buffer.is_stopped() {
                    tracing::warn!("Audio stream interrupted: {}", e);
                }
                break;
            }
        }
    }

    buffer.mark_end();
    tracing::debug!("Decoder thread exited");
}

/// A live stream open on the output device.
pub struct StreamPlayer {
    url: String,
    buffer: Arc<SharedBuffer>,
    format: OutputFormat,
    commands: std_mpsc::Sender<OutputCommand>,
    output: Mutex<Option<JoinHandle<()>>>,
    decoding: Mutex<Option<Decoding>>,
}

impl StreamPlayer {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    /// Whether the network stream has ended and resuming needs a reconnect.
    pub fn has_ended(&self) -> bool {
        self.buffer.has_ended()
    }

    async fn command(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), EngineError>>) -> OutputCommand,
    ) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)?
    }

    fn shutdown(&self) {
        self.buffer.stop();
        if let Some(decoding) = self.decoding.lock().take() {
            decoding.cancel();
        }
        let _ = self.commands.send(OutputCommand::Shutdown);
        if let Some(join) = self.output.lock().take() {
            if join.join().is_err() {
                tracing::warn!("Output thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for StreamPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPlayer")
            .field("url", &self.url)
            .field("format", &self.format)
            .field("buffered", &self.buffer.len())
            .field("paused", &self.buffer.is_paused())
            .finish()
    }
}

impl Drop for StreamPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl AudioEngine for StreamEngine {
    type Handle = StreamPlayer;

    async fn configure_session(&self, options: &AudioSessionOptions) -> Result<(), EngineError> {
        // Pas de session audio système sur desktop : la lecture continue toujours
        tracing::debug!(
            background_playback = options.background_playback,
            duck_others = options.duck_others,
            "Audio session options noted"
        );
        Ok(())
    }

    async fn create_from_url(
        &self,
        url: &str,
        options: CreateOptions,
    ) -> Result<StreamPlayer, EngineError> {
        if options.looping {
            tracing::debug!("Looping is ignored for live streams");
        }

        let capacity_hint = 48_000 * 2 * BUFFER_SECONDS;
        let buffer = Arc::new(SharedBuffer::new(capacity_hint));
        let output = spawn_output(buffer.clone(), options.auto_start).await?;

        let decoding = match self.open_stream(url, buffer.clone(), output.format).await {
            Ok(decoding) => decoding,
            Err(e) => {
                buffer.stop();
                let _ = output.commands.send(OutputCommand::Shutdown);
                // Le thread de sortie se termine seul, on ne bloque pas le runtime
                let join = output.join;
                let _ = tokio::task::spawn_blocking(move || join.join()).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Streaming {} at {} Hz, {} channel(s)",
            url,
            output.format.sample_rate,
            output.format.channels
        );

        Ok(StreamPlayer {
            url: url.to_string(),
            buffer,
            format: output.format,
            commands: output.commands,
            output: Mutex::new(Some(output.join)),
            decoding: Mutex::new(Some(decoding)),
        })
    }

    async fn pause(&self, handle: &StreamPlayer) -> Result<(), EngineError> {
        handle.command(OutputCommand::Pause).await
    }

    async fn resume(&self, handle: &StreamPlayer) -> Result<(), EngineError> {
        // Flux terminé pendant la pause : on se reconnecte sur le direct
        if handle.has_ended() {
            tracing::info!("Stream ended while paused, reconnecting to {}", handle.url);
            if let Some(old) = handle.decoding.lock().take() {
                old.cancel();
            }
            handle.buffer.clear();
            let decoding = self
                .open_stream(&handle.url, handle.buffer.clone(), handle.format)
                .await?;
            *handle.decoding.lock() = Some(decoding);
        }

        handle.command(OutputCommand::Play).await
    }

    fn release(&self, handle: StreamPlayer) {
        tracing::debug!("Releasing stream {}", handle.url);
        drop(handle);
    }
}
