//! Bridge from an async HTTP byte stream to a blocking [`Read`]
//!
//! The decoder runs on a plain thread and wants `std::io::Read`; reqwest
//! hands out an async stream of `Bytes`. A tokio task forwards chunks through
//! a bounded channel, so a slow decoder applies backpressure to the network
//! without ever blocking the runtime.

use std::io::{self, Read};
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const CHANNEL_BUFFER_SIZE: usize = 32;

pub(crate) type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

pub struct ChannelReader {
    receiver: mpsc::Receiver<Result<Bytes, String>>,
    current_chunk: Option<Bytes>,
    position: usize,
}

impl ChannelReader {
    /// Start forwarding `stream`. Must be called from within a tokio runtime.
    ///
    /// Cancelling `stop` ends the stream: the reader then reports EOF.
    pub fn new(stream: ByteStream, stop: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        tokio::spawn(Self::stream_feeder(stream, tx, stop));
        Self::from_receiver(rx)
    }

    pub(crate) fn from_receiver(receiver: mpsc::Receiver<Result<Bytes, String>>) -> Self {
        Self {
            receiver,
            current_chunk: None,
            position: 0,
        }
    }

    async fn stream_feeder(
        mut stream: ByteStream,
        tx: mpsc::Sender<Result<Bytes, String>>,
        stop: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                _ = stop.cancelled() => break,
                next = stream.next() => next,
            };

            let Some(result) = next else {
                tracing::debug!("stream_feeder: HTTP stream ended");
                break;
            };

            let failed = result.is_err();
            let sent = tokio::select! {
                _ = stop.cancelled() => break,
                sent = tx.send(result.map_err(|e| e.to_string())) => sent,
            };

            // Lecteur abandonné ou erreur réseau transmise : on s'arrête
            if sent.is_err() || failed {
                break;
            }
        }
        tracing::trace!("stream_feeder exited");
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(chunk) = &self.current_chunk {
                if self.position < chunk.len() {
                    let available = chunk.len() - self.position;
                    let to_copy = available.min(buf.len());
                    buf[..to_copy].copy_from_slice(&chunk[self.position..self.position + to_copy]);
                    self.position += to_copy;
                    return Ok(to_copy);
                }
            }

            match self.receiver.blocking_recv() {
                Some(Ok(bytes)) => {
                    tracing::trace!("ChannelReader received chunk of {} bytes", bytes.len());
                    self.current_chunk = Some(bytes);
                    self.position = 0;
                }
                Some(Err(e)) => {
                    tracing::warn!("ChannelReader received error chunk: {}", e);
                    return Err(io::Error::other(e));
                }
                None => return Ok(0),
            }
        }
    }
}
