//! Error types for the core engine crate.

use thiserror::Error;
use vibecheck_rs_config::ConfigError;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum VibecheckCoreError {
    /// Model id is not present in the registry.
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// Mode id is not present in the registry.
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    /// A registry table has no entries.
    #[error("registry has no {0}")]
    EmptyRegistry(&'static str),
    /// Batch size outside the selector range.
    #[error("batch size must be between 1 and {max}, got {size}")]
    InvalidBatchSize { size: usize, max: usize },
    /// Configuration failed semantic validation.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
