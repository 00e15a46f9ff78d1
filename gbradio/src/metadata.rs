//! Now-playing title polling
//!
//! The radio exposes the title of the current shabad as a plain-text
//! endpoint. [`MetadataPoller`] fetches it immediately on [`start`], then at a
//! fixed interval, and publishes the trimmed text. Empty bodies and failures
//! publish [`FALLBACK_TITLE`] instead; nothing is retried early and nothing is
//! reported to the caller.
//!
//! [`start`]: MetadataPoller::start

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Title shown before the first poll resolves
pub const DEFAULT_TITLE: &str = "Loading current shabad...";

/// Title shown when the endpoint is empty or unreachable
pub const FALLBACK_TITLE: &str = "Live Gurbani Kirtan";

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Shortest accepted polling period
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default timeout for the metadata request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("gbradio/", env!("CARGO_PKG_VERSION"));

/// Anything able to produce the raw now-playing text.
#[async_trait]
pub trait TitleSource: Send + Sync + 'static {
    async fn fetch_title(&self) -> Result<String, FetchError>;
}

/// [`TitleSource`] reading a plain-text HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpTitleSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpTitleSource {
    /// Create a source with its own HTTP client
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Create a source sharing an existing HTTP client
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TitleSource for HttpTitleSource {
    async fn fetch_title(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        // Une page d'erreur n'est pas un titre, même avec un corps
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response.text().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(err)
    }
}

/// Turn the outcome of a fetch into the title to display.
pub fn resolve_title(outcome: Result<String, FetchError>, fallback: &str) -> String {
    match outcome {
        Ok(body) => {
            let title = body.trim();
            if title.is_empty() {
                debug!("Metadata endpoint returned an empty title");
                fallback.to_string()
            } else {
                title.to_string()
            }
        }
        Err(err) => {
            warn!("Cannot fetch current title: {}", err);
            fallback.to_string()
        }
    }
}

struct Running {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Repeating fetch-and-publish loop for the current title.
pub struct MetadataPoller<S: TitleSource> {
    source: Arc<S>,
    interval: Duration,
    fallback: Arc<str>,
    title: Arc<watch::Sender<String>>,
    running: Mutex<Option<Running>>,
}

impl<S: TitleSource> MetadataPoller<S> {
    /// Create a stopped poller with the default interval and titles.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_settings(source, DEFAULT_POLL_INTERVAL, DEFAULT_TITLE, FALLBACK_TITLE)
    }

    /// Create a stopped poller.
    ///
    /// `interval` is raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn with_settings(
        source: Arc<S>,
        interval: Duration,
        initial_title: impl Into<String>,
        fallback_title: impl Into<String>,
    ) -> Self {
        let (title, _) = watch::channel(initial_title.into());
        Self {
            source,
            interval: interval.max(MIN_POLL_INTERVAL),
            fallback: Arc::from(fallback_title.into()),
            title: Arc::new(title),
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The title currently published
    pub fn current_title(&self) -> String {
        self.title.borrow().clone()
    }

    /// Subscribe to title changes.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.title.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Fetch once and publish the result, outside of the timer.
    pub async fn poll_once(&self) -> String {
        let title = resolve_title(self.source.fetch_title().await, &self.fallback);
        self.title.send_replace(title.clone());
        title
    }

    /// Begin polling: one fetch now, then one per interval until
    /// [`stop`](Self::stop).
    ///
    /// Must be called from within a tokio runtime. Starting a running
    /// poller does nothing.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            debug!("Metadata poller already running");
            return;
        }

        let stop = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.source.clone(),
            self.interval,
            self.fallback.clone(),
            self.title.clone(),
            stop.clone(),
        ));

        info!(interval_secs = self.interval.as_secs(), "Metadata poller started");
        *running = Some(Running { stop, task });
    }

    /// Cancel the timer. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.stop.cancel();
            info!("Metadata poller stopped");
            // La tâche se termine d'elle-même, on ne l'attend pas
            drop(running.task);
        }
    }
}

impl<S: TitleSource> Drop for MetadataPoller<S> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.stop.cancel();
        }
    }
}

async fn poll_loop<S: TitleSource>(
    source: Arc<S>,
    interval: Duration,
    fallback: Arc<str>,
    title: Arc<watch::Sender<String>>,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            outcome = source.fetch_title() => outcome,
        };

        let next = resolve_title(outcome, &fallback);
        debug!(title = %next, "Publishing current title");
        title.send_replace(next);
    }

    debug!("Metadata poll loop exited");
}
