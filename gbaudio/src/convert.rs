//! Conversion from the decoded stream layout to the output device layout

use gbradio::EngineError;
use rubato::{FftFixedIn, Resampler as _};

/// Remap interleaved `input` from `from` channels to `to` channels.
///
/// Mono is duplicated, a mono output gets the average of all inputs, other
/// layouts wrap around the source channels.
pub fn map_channels(input: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return input.to_vec();
    }

    let frames = input.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in input.chunks_exact(from) {
        if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for c in 0..to {
                out.push(frame[c % from]);
            }
        }
    }
    out
}

/// Frames handed to the FFT resampler per call.
const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Streaming resampler over interleaved frames, backed by `rubato`.
///
/// Decoded packets rarely match the resampler's fixed input size, so input is
/// accumulated per channel and processed once a full chunk is available.
pub struct StreamResampler {
    channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: usize) -> Result<Self, EngineError> {
        let channels = channels.max(1);
        let resampler = if from_rate == to_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                from_rate as usize,
                to_rate as usize,
                RESAMPLE_CHUNK,
                RESAMPLE_SUB_CHUNKS,
                channels,
            )
            .map_err(|e| {
                EngineError::Decode(format!(
                    "Cannot resample {} Hz to {} Hz: {}",
                    from_rate, to_rate, e
                ))
            })?;
            Some(resampler)
        };

        Ok(Self {
            channels,
            resampler,
            pending: vec![Vec::new(); channels],
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, EngineError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(input.to_vec());
        };

        let ch = self.channels;
        for frame in input.chunks_exact(ch) {
            for (c, sample) in frame.iter().enumerate() {
                self.pending[c].push(*sample);
            }
        }

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let planar = resampler
                .process(&chunk, None)
                .map_err(|e| EngineError::Decode(format!("Resampling failed: {}", e)))?;

            let frames = planar.first().map_or(0, Vec::len);
            out.reserve(frames * ch);
            for i in 0..frames {
                for channel in &planar {
                    out.push(channel[i]);
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for StreamResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResampler")
            .field("channels", &self.channels)
            .field("passthrough", &self.is_passthrough())
            .field("pending_frames", &self.pending[0].len())
            .finish()
    }
}

/// Channel mapping followed by resampling, for one decoded stream.
#[derive(Debug)]
pub struct FormatConverter {
    source_channels: usize,
    target_channels: usize,
    source_rate: u32,
    target_rate: u32,
    resampler: StreamResampler,
}

impl FormatConverter {
    pub fn new(
        source_rate: u32,
        source_channels: usize,
        target_rate: u32,
        target_channels: usize,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            source_channels,
            target_channels,
            source_rate,
            target_rate,
            resampler: StreamResampler::new(source_rate, target_rate, target_channels)?,
        })
    }

    /// Rebuild the pipeline when the decoded format changes mid-stream.
    pub fn reconfigure(
        &mut self,
        source_rate: u32,
        source_channels: usize,
    ) -> Result<(), EngineError> {
        if source_rate != self.source_rate || source_channels != self.source_channels {
            *self = Self::new(
                source_rate,
                source_channels,
                self.target_rate,
                self.target_channels,
            )?;
        }
        Ok(())
    }

    pub fn convert(&mut self, samples: &[f32]) -> Result<Vec<f32>, EngineError> {
        let mapped = map_channels(samples, self.source_channels, self.target_channels);
        self.resampler.process(&mapped)
    }
}
