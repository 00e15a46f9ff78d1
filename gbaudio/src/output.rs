//! cpal output running on its own thread
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream lives and
//! dies on the thread that built it. The rest of the engine talks to it with
//! [`OutputCommand`]s and feeds it through a [`SharedBuffer`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use gbradio::EngineError;

/// Seconds of audio kept ahead of the device.
pub const BUFFER_SECONDS: usize = 2;

/// Buffer partagé entre le décodeur et le callback cpal
pub struct SharedBuffer {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    stopped: AtomicBool,
    end_of_stream: AtomicBool,
}

impl SharedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            end_of_stream: AtomicBool::new(false),
        }
    }

    pub fn push_samples(&self, samples: &[f32]) {
        self.samples.lock().extend(samples.iter().copied());
    }

    /// Fill `out` from the queue, padding with silence.
    pub fn fill(&self, out: &mut [f32]) {
        if self.paused.load(Ordering::Relaxed) {
            out.fill(0.0);
            return;
        }
        let mut samples = self.samples.lock();
        for slot in out.iter_mut() {
            *slot = samples.pop_front().unwrap_or(0.0);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn mark_end(&self) {
        self.end_of_stream.store(true, Ordering::SeqCst);
    }

    /// Clear the end marker before a new decoder starts feeding the buffer.
    pub fn reopen(&self) {
        self.end_of_stream.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.end_of_stream.load(Ordering::SeqCst) && self.is_empty()
    }

    pub fn has_ended(&self) -> bool {
        self.end_of_stream.load(Ordering::SeqCst)
    }
}

/// Layout the device was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: usize,
}

pub enum OutputCommand {
    Play(oneshot::Sender<Result<(), EngineError>>),
    Pause(oneshot::Sender<Result<(), EngineError>>),
    Shutdown,
}

pub struct OutputThread {
    pub commands: std_mpsc::Sender<OutputCommand>,
    pub format: OutputFormat,
    pub join: JoinHandle<()>,
}

/// Open the default output device on a dedicated thread.
///
/// Resolves once the stream is built, with the device format the decoded
/// audio must be converted to.
pub async fn spawn_output(
    buffer: Arc<SharedBuffer>,
    auto_start: bool,
) -> Result<OutputThread, EngineError> {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (commands, rx) = std_mpsc::channel();

    let join = thread::Builder::new()
        .name("gurbani247-output".to_string())
        .spawn(move || output_thread(buffer, auto_start, ready_tx, rx))
        .map_err(|e| EngineError::Device(format!("Failed to spawn output thread: {}", e)))?;

    let format = match ready_rx.await {
        Ok(Ok(format)) => format,
        Ok(Err(e)) => {
            // Le thread a déjà répondu et se termine : détaché
            drop(join);
            return Err(e);
        }
        Err(_) => {
            drop(join);
            return Err(EngineError::Device(
                "Output thread exited before opening the device".to_string(),
            ));
        }
    };

    Ok(OutputThread {
        commands,
        format,
        join,
    })
}

fn output_thread(
    buffer: Arc<SharedBuffer>,
    auto_start: bool,
    ready: oneshot::Sender<Result<OutputFormat, EngineError>>,
    commands: std_mpsc::Receiver<OutputCommand>,
) {
    let (stream, format) = match open_stream(buffer.clone()) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if auto_start {
        if let Err(e) = stream.play() {
            let _ = ready.send(Err(EngineError::Device(format!("Failed to play stream: {}", e))));
            return;
        }
    } else {
        buffer.set_paused(true);
    }

    if ready.send(Ok(format)).is_err() {
        return;
    }

    // Boucle de commandes : se termine sur Shutdown ou quand l'émetteur disparaît
    while let Ok(command) = commands.recv() {
        match command {
            OutputCommand::Play(reply) => {
                buffer.set_paused(false);
                let result = stream
                    .play()
                    .map_err(|e| EngineError::Device(format!("Failed to play stream: {}", e)));
                let _ = reply.send(result);
            }
            OutputCommand::Pause(reply) => {
                buffer.set_paused(true);
                let result = stream
                    .pause()
                    .map_err(|e| EngineError::Device(format!("Failed to pause stream: {}", e)));
                let _ = reply.send(result);
            }
            OutputCommand::Shutdown => break,
        }
    }

    drop(stream);
    tracing::debug!("Output thread exited");
}

fn open_stream(buffer: Arc<SharedBuffer>) -> Result<(cpal::Stream, OutputFormat), EngineError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| EngineError::Device("No output device available".to_string()))?;

    tracing::debug!(
        "Using audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config = device
        .default_output_config()
        .map_err(|e| EngineError::Device(format!("Failed to get output config: {}", e)))?;

    tracing::debug!(
        "Output config: {} channels, {} Hz, {:?}",
        config.channels(),
        config.sample_rate().0,
        config.sample_format()
    );

    let format = OutputFormat {
        sample_rate: config.sample_rate().0,
        channels: config.channels() as usize,
    };
    let sample_format = config.sample_format();
    let config: cpal::StreamConfig = config.into();

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, buffer),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, buffer),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, buffer),
        SampleFormat::I32 => build_stream::<i32>(&device, &config, buffer),
        other => Err(EngineError::Device(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }?;

    Ok((stream, format))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: Arc<SharedBuffer>,
) -> Result<cpal::Stream, EngineError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                buffer.fill(&mut scratch);
                for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*sample);
                }
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| EngineError::Device(format!("Failed to build output stream: {}", e)))
}
