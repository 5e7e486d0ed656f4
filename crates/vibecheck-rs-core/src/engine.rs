//! Engine facade wiring config, registry, store, client, and round manager.

use crate::backend::{EnvSecretSource, LazyBackend};
use crate::client::GenerationClient;
use crate::error::VibecheckCoreError;
use crate::registry::Registry;
use crate::rounds::{RoundHandle, RoundManager};
use crate::selection::Selection;
use crate::state::{JsonSettingsStore, SettingsStore};
use crate::store::AppStore;
use log::{debug, info};
use std::sync::Arc;
use vibecheck_rs_config::VibecheckConfig;
use vibecheck_rs_protocol::{EventSink, GenerationBackend, RoundId};

/// Headless comparison engine.
pub struct Vibecheck {
    config: Arc<VibecheckConfig>,
    store: AppStore,
    rounds: RoundManager,
}

impl Vibecheck {
    /// Construct an engine with optional overrides.
    ///
    /// Without a backend, a lazily credentialed Gemini backend is used. Without
    /// a settings store, history is persisted to the configured or default
    /// path unless `history.enabled` is false. Configs built in code are
    /// validated the same way as loaded ones.
    pub fn new(
        config: VibecheckConfig,
        registry: Option<Registry>,
        backend: Option<Arc<dyn GenerationBackend>>,
        settings: Option<Arc<dyn SettingsStore>>,
        event_sink: Option<Arc<dyn EventSink>>,
    ) -> Result<Self, VibecheckCoreError> {
        info!("initializing vibecheck engine");
        config.validate()?;
        debug!(
            "engine config (concurrency={}, max_attempts={}, history={})",
            config.generation.concurrency, config.generation.max_attempts, config.history.enabled
        );
        let registry = Arc::new(registry.unwrap_or_default());
        let selection = Selection::from_config(&config.session, &registry)?;

        let backend = match backend {
            Some(backend) => backend,
            None => {
                let secrets = Arc::new(EnvSecretSource::from_config(&config.backend));
                Arc::new(LazyBackend::gemini(secrets, &config.backend))
            }
        };

        let settings = if config.history.enabled {
            match settings {
                Some(settings) => Some(settings),
                None => Some(Arc::new(JsonSettingsStore::open(config.history.path.as_ref())?)
                    as Arc<dyn SettingsStore>),
            }
        } else {
            None
        };

        let mut store =
            AppStore::new(registry, selection).with_history_capacity(config.history.capacity);
        if let Some(sink) = event_sink {
            store = store.with_event_sink(sink);
        }
        if let Some(settings) = settings {
            store = store.with_settings(settings);
        }

        let client = GenerationClient::new(backend, &config.generation);
        let rounds = RoundManager::new(store.clone(), client);
        info!("vibecheck engine initialized");
        Ok(Self {
            config: Arc::new(config),
            store,
            rounds,
        })
    }

    pub fn config(&self) -> &VibecheckConfig {
        &self.config
    }

    /// Shared state store, for selection changes, annotations, and reads.
    pub fn store(&self) -> &AppStore {
        &self.store
    }

    pub fn rounds(&self) -> &RoundManager {
        &self.rounds
    }

    /// Submit a prompt under the current selection. See [`RoundManager::submit_round`].
    pub fn submit_round(
        &self,
        prompt: impl Into<String>,
        prompt_image: Option<String>,
    ) -> Option<RoundHandle> {
        self.rounds.submit_round(prompt, prompt_image)
    }

    pub fn remove_round(&self, round_id: RoundId) -> bool {
        self.rounds.remove_round(round_id)
    }

    pub fn reset(&self) -> usize {
        self.rounds.reset()
    }
}
