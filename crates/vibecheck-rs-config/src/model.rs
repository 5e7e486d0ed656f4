//! Configuration schema for Vibecheck.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the batch size selector.
pub const MAX_BATCH_SIZE: usize = 9;

/// Root config for the Vibecheck engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VibecheckConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl VibecheckConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> VibecheckConfigBuilder {
        VibecheckConfigBuilder::new()
    }
}

/// Builder for assembling a `VibecheckConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct VibecheckConfigBuilder {
    config: VibecheckConfig,
}

impl VibecheckConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: VibecheckConfig::default(),
        }
    }

    /// Replace the generation client configuration.
    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.config.generation = generation;
        self
    }

    /// Replace the backend configuration.
    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.config.backend = backend;
        self
    }

    /// Replace the prompt history configuration.
    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    /// Replace the initial session selection.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Finalize and return the built `VibecheckConfig`.
    pub fn build(self) -> VibecheckConfig {
        self.config
    }
}

/// Timeout, retry, and concurrency limits for generation calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            concurrency: default_concurrency(),
        }
    }
}

impl GenerationConfig {
    /// Per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// First backoff delay; later delays double.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Default per-attempt deadline in milliseconds.
fn default_timeout_ms() -> u64 {
    193_333
}

/// Default number of attempts including the first.
fn default_max_attempts() -> u32 {
    5
}

/// Default backoff base in milliseconds.
fn default_base_delay_ms() -> u64 {
    1_233
}

/// Default cap on in-flight generation calls.
fn default_concurrency() -> usize {
    9
}

/// Backend endpoint and credential lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

/// Environment variables consulted for the API key, in order.
fn default_api_key_env() -> Vec<String> {
    vec!["GEMINI_API_KEY".to_string(), "API_KEY".to_string()]
}

/// Prompt history persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryConfig {
    #[serde(default = "default_history_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_history_enabled(),
            path: None,
            capacity: default_history_capacity(),
        }
    }
}

fn default_history_enabled() -> bool {
    true
}

/// Default number of prompts kept in history.
fn default_history_capacity() -> usize {
    50
}

/// Initial mode and model selection for a new session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default)]
    pub output_mode: Option<String>,
    #[serde(default = "default_batch_mode")]
    pub batch_mode: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub batch_model: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_mode: None,
            batch_mode: default_batch_mode(),
            batch_size: default_batch_size(),
            batch_model: None,
        }
    }
}

fn default_batch_mode() -> bool {
    true
}

fn default_batch_size() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_generation_limits() {
        let config = VibecheckConfig::default();
        assert_eq!(config.generation.timeout(), Duration::from_millis(193_333));
        assert_eq!(config.generation.base_delay(), Duration::from_millis(1_233));
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.concurrency, 9);
        assert_eq!(config.history.capacity, 50);
        assert_eq!(config.session.batch_size, 3);
    }

    #[test]
    fn builder_replaces_sections() {
        let config = VibecheckConfig::builder()
            .history(HistoryConfig {
                enabled: false,
                ..HistoryConfig::default()
            })
            .session(SessionConfig {
                batch_size: 5,
                ..SessionConfig::default()
            })
            .build();
        assert!(!config.history.enabled);
        assert_eq!(config.session.batch_size, 5);
        assert_eq!(config.generation, GenerationConfig::default());
    }
}
