use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use vibecheck_rs_protocol::{GenerationBackend, GenerationError, GenerationRequest, RawResponse};

/// Backend that always returns the same response and records requests.
#[derive(Debug)]
pub struct FixedBackend {
    response: RawResponse,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FixedBackend {
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(RawResponse::Text(text.into()))
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(RawResponse::Image {
            mime_type: mime_type.into(),
            data: data.into(),
        })
    }

    pub fn new(response: RawResponse) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for FixedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        self.requests.lock().push(request.clone());
        Ok(self.response.clone())
    }
}

/// Backend that plays back a fixed sequence of results, one per call.
///
/// Calls past the end of the script fail with a backend error.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<RawResponse, GenerationError>>>,
    call_instants: Mutex<Vec<Instant>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<RawResponse, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            call_instants: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.call_instants.lock().len()
    }

    /// Tokio instants at which each call started.
    pub fn call_instants(&self) -> Vec<Instant> {
        self.call_instants.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        self.call_instants.lock().push(Instant::now());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Backend("script exhausted".to_string())))
    }
}

/// Backend that always fails with the same error.
#[derive(Debug)]
pub struct FailingBackend {
    error: GenerationError,
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new(error: GenerationError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for FailingBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Backend whose calls never resolve.
#[derive(Debug, Default)]
pub struct HangingBackend {
    calls: AtomicUsize,
}

impl HangingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for HangingBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Backend whose calls block until the test releases them.
///
/// Tracks how many calls are inside the backend at once and the peak.
#[derive(Debug)]
pub struct GatedBackend {
    gate: Semaphore,
    response: RawResponse,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedBackend {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            gate: Semaphore::new(0),
            response: RawResponse::Text(text.into()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Let `count` blocked (or future) calls complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Yield until at least `count` calls have entered the backend.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl GenerationBackend for GatedBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let permit = self.gate.acquire().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match permit {
            Ok(permit) => {
                permit.forget();
                Ok(self.response.clone())
            }
            Err(_) => Err(GenerationError::Cancelled),
        }
    }
}
