//! tracing setup
//!
//! The terminal is owned by the player screen, so records go to a file.
//! `RUST_LOG` wins over the configured level.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub fn init_tracing(log_file: &Path, min_level: &str) {
    let _ = tracing_log::LogTracer::init();
    let writer = log_writer(log_file);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(min_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

/// Configured level name (`INFO`, `debug`, ...) as a filter directive.
pub fn default_directive(min_level: &str) -> String {
    match min_level.trim().to_ascii_lowercase().as_str() {
        level @ ("trace" | "debug" | "info" | "warn" | "error" | "off") => level.to_string(),
        "warning" => "warn".to_string(),
        _ => "info".to_string(),
    }
}

fn log_writer(path: &Path) -> BoxMakeWriter {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let shared = SharedLogWriter::new(file);
            BoxMakeWriter::new(move || shared.clone())
        }
        Err(err) => {
            eprintln!(
                "Cannot open {} for logging: {}. Logs are discarded",
                path.display(),
                err
            );
            BoxMakeWriter::new(io::sink)
        }
    }
}

#[derive(Clone)]
struct SharedLogWriter {
    inner: Arc<Mutex<File>>,
}

impl SharedLogWriter {
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| io::Error::other(err.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| io::Error::other(err.to_string()))?;
        guard.flush()
    }
}
