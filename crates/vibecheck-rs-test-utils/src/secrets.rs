use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use vibecheck_rs_protocol::SecretSource;

/// Secret source returning a fixed key (or none) and counting lookups.
#[derive(Debug, Default)]
pub struct StaticSecret {
    key: Option<String>,
    calls: AtomicUsize,
}

impl StaticSecret {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretSource for StaticSecret {
    async fn api_key(&self) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.key.clone()
    }
}
