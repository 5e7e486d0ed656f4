//! Secret lookup and lazily credentialed backends.

use super::GeminiBackend;
use async_trait::async_trait;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::OnceCell;
use vibecheck_rs_config::BackendConfig;
use vibecheck_rs_protocol::{
    GenerationBackend, GenerationError, GenerationRequest, RawResponse, SecretSource,
};

/// Reads the API key from the first non-empty environment variable in `vars`.
#[derive(Debug, Clone)]
pub struct EnvSecretSource {
    vars: Vec<String>,
}

impl EnvSecretSource {
    pub fn new(vars: Vec<String>) -> Self {
        Self { vars }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.api_key_env.clone())
    }
}

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn api_key(&self) -> Option<String> {
        self.vars.iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
    }
}

/// Builds a backend once the API key is known.
pub type BackendFactory = Box<dyn Fn(String) -> Arc<dyn GenerationBackend> + Send + Sync>;

/// Backend that asks the secret source for a key on first use.
///
/// The lookup outcome is cached, including a missing key: every later call
/// fails with [`GenerationError::MissingCredential`] without asking again.
pub struct LazyBackend {
    secrets: Arc<dyn SecretSource>,
    factory: BackendFactory,
    backend: OnceCell<Option<Arc<dyn GenerationBackend>>>,
}

impl LazyBackend {
    pub fn new(
        secrets: Arc<dyn SecretSource>,
        factory: impl Fn(String) -> Arc<dyn GenerationBackend> + Send + Sync + 'static,
    ) -> Self {
        Self {
            secrets,
            factory: Box::new(factory),
            backend: OnceCell::new(),
        }
    }

    /// Lazily build a [`GeminiBackend`] against the configured endpoint.
    pub fn gemini(secrets: Arc<dyn SecretSource>, config: &BackendConfig) -> Self {
        let api_base = config.api_base.clone();
        Self::new(secrets, move |api_key| {
            Arc::new(GeminiBackend::new(api_base.clone(), api_key)) as Arc<dyn GenerationBackend>
        })
    }

    async fn resolve(&self) -> Option<Arc<dyn GenerationBackend>> {
        self.backend
            .get_or_init(|| async {
                match self.secrets.api_key().await {
                    Some(api_key) => {
                        info!("initialized generation backend");
                        Some((self.factory)(api_key))
                    }
                    None => {
                        error!("API key missing; generation is disabled");
                        None
                    }
                }
            })
            .await
            .clone()
    }
}

#[async_trait]
impl GenerationBackend for LazyBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, GenerationError> {
        let Some(backend) = self.resolve().await else {
            return Err(GenerationError::MissingCredential);
        };
        backend.generate(request).await
    }
}
