//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use gbradio::{
    AudioEngine, AudioSessionOptions, CreateOptions, EngineError, FetchError, TitleSource,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

#[derive(Debug, PartialEq, Eq)]
pub struct FakeHandle {
    pub id: usize,
}

/// Engine recording every call.
///
/// When gated, each async call waits for a permit from [`FakeEngine::open`],
/// which lets a test observe the controller while a call is in flight.
pub struct FakeEngine {
    pub configures: AtomicUsize,
    pub creates: AtomicUsize,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub released: Mutex<Vec<usize>>,
    pub urls: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    pub fail_pause: AtomicBool,
    pub fail_resume: AtomicBool,
    gated: AtomicBool,
    gate: Semaphore,
    next_id: AtomicUsize,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            configures: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            fail_pause: AtomicBool::new(false),
            fail_resume: AtomicBool::new(false),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> Arc<Self> {
        let engine = Self::default();
        engine.gated.store(true, Ordering::SeqCst);
        Arc::new(engine)
    }

    /// Let `calls` pending engine calls resolve.
    pub fn open(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.creates() + self.pauses() + self.resumes()
    }

    pub fn released(&self) -> Vec<usize> {
        self.released.lock().clone()
    }

    /// Every call suspends at least once, like a real engine would.
    async fn wait_gate(&self) {
        tokio::task::yield_now().await;
        if self.gated.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    type Handle = FakeHandle;

    async fn configure_session(&self, _options: &AudioSessionOptions) -> Result<(), EngineError> {
        self.configures.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_from_url(
        &self,
        url: &str,
        options: CreateOptions,
    ) -> Result<FakeHandle, EngineError> {
        assert!(options.auto_start, "stream must be created auto-starting");
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        self.wait_gate().await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(EngineError::Network("connection refused".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle { id })
    }

    async fn pause(&self, _handle: &FakeHandle) -> Result<(), EngineError> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.fail_pause.load(Ordering::SeqCst) {
            return Err(EngineError::other("pause rejected"));
        }
        Ok(())
    }

    async fn resume(&self, _handle: &FakeHandle) -> Result<(), EngineError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(EngineError::Device("output lost".into()));
        }
        Ok(())
    }

    fn release(&self, handle: FakeHandle) {
        self.released.lock().push(handle.id);
    }
}

/// Title source replaying scripted answers, then repeating the last one.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<String, FetchError>>>,
    last: Mutex<Option<String>>,
    pub fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<String, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn always(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(body.to_string())])
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TitleSource for ScriptedSource {
    async fn fetch_title(&self) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(Ok(body)) => {
                *self.last.lock() = Some(body.clone());
                Ok(body)
            }
            Some(Err(err)) => {
                *self.last.lock() = None;
                Err(err)
            }
            None => match self.last.lock().clone() {
                Some(body) => Ok(body),
                None => Err(FetchError::other("script exhausted")),
            },
        }
    }
}
