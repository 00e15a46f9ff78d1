//! Symphonia decoder over a non-seekable live stream

use std::io::{ErrorKind, Read};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use gbradio::EngineError;

/// Decodes packets of the first audio track to interleaved `f32` samples.
pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl StreamDecoder {
    /// Probe `source`. Blocks until enough bytes have arrived to identify the format.
    pub fn open<R>(source: R, extension: Option<&str>) -> Result<Self, EngineError>
    where
        R: Read + Send + Sync + 'static,
    {
        let mss = MediaSourceStream::new(Box::new(ReadOnlySource::new(source)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| EngineError::Decode(format!("Failed to probe stream format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| EngineError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2)
            .max(1);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::Decode(format!("Failed to create decoder: {}", e)))?;

        tracing::debug!(
            "Stream opened: {} Hz, {} channel(s), codec {:?}",
            sample_rate,
            channels,
            track.codec_params.codec
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Next block of interleaved samples, `None` once the stream has ended.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, EngineError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(EngineError::Network(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let signal = *decoded.spec();
                    let frames = decoded.capacity() as u64;

                    // Le tampon est réalloué si un paquet dépasse sa capacité
                    let needed = decoded.capacity() * signal.channels.count();
                    if self
                        .sample_buf
                        .as_ref()
                        .is_some_and(|buf| buf.capacity() < needed)
                    {
                        self.sample_buf = None;
                    }
                    let buf = self
                        .sample_buf
                        .get_or_insert_with(|| SampleBuffer::<f32>::new(frames, signal));
                    buf.copy_interleaved_ref(decoded);

                    let channels = signal.channels.count().max(1);
                    if channels != self.channels || signal.rate != self.sample_rate {
                        tracing::debug!(
                            "Stream format changed: {} Hz, {} channel(s)",
                            signal.rate,
                            channels
                        );
                        self.channels = channels;
                        self.sample_rate = signal.rate;
                    }

                    return Ok(Some(buf.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Decode error (skipping packet): {}", e);
                    continue;
                }
                Err(e) => return Err(EngineError::Decode(format!("Decode failed: {}", e))),
            }
        }
    }
}

/// Container hint from the response content type, then from the URL.
pub fn format_extension(content_type: Option<&str>, url: &str) -> Option<String> {
    if let Some(ct) = content_type {
        let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let ext = match mime.as_str() {
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
            "audio/aac" | "audio/aacp" | "audio/x-aac" => Some("aac"),
            "audio/ogg" | "application/ogg" | "audio/vorbis" | "audio/opus" => Some("ogg"),
            "audio/flac" | "audio/x-flac" => Some("flac"),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
            _ => None,
        };
        if let Some(ext) = ext {
            return Some(ext.to_string());
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(
            format_extension(Some("audio/mpeg"), "https://radio.test/stream").as_deref(),
            Some("mp3")
        );
        assert_eq!(
            format_extension(Some("audio/aacp; charset=binary"), "https://radio.test/x").as_deref(),
            Some("aac")
        );
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            format_extension(None, "https://gurbanikirtan.radioca.st/start.mp3").as_deref(),
            Some("mp3")
        );
        assert_eq!(
            format_extension(Some("application/octet-stream"), "https://radio.test/live.ogg?x=1")
                .as_deref(),
            Some("ogg")
        );
        assert_eq!(format_extension(None, "https://radio.test/stream"), None);
    }

    #[test]
    fn test_open_garbage_is_decode_error() {
        let data = std::io::Cursor::new(vec![0u8; 64]);
        let err = StreamDecoder::open(data, Some("mp3")).err();
        assert!(matches!(err, Some(EngineError::Decode(_))));
    }
}
