//! Core engine for Vibecheck.
//!
//! This crate owns the model and mode registries, the selection state machine,
//! the generation client, the application state store, and the round manager
//! used by the SDK and the headless binary.

pub mod backend;
pub mod client;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod history;
pub mod registry;
pub mod rounds;
pub mod selection;
pub mod state;
pub mod store;

pub use backend::{EnvSecretSource, GeminiBackend, LazyBackend};
pub use client::{GenerationClient, RetryPolicy};
pub use engine::Vibecheck;
pub use error::VibecheckCoreError;
pub use event_bus::EventBus;
pub use history::PromptHistory;
pub use registry::{ModeInfo, ModelInfo, Registry};
pub use rounds::{RoundHandle, RoundManager};
pub use selection::{Selection, VersusEntry, reconcile};
pub use state::{JsonSettingsStore, PersistedState, SettingsStore, StateError};
pub use store::{AppState, AppStore};
/// Shared protocol types used across the engine API.
pub use vibecheck_rs_protocol::{
    EventSink, FeedEvent, FeedEventPayload, GenerationBackend, GenerationError,
    GenerationRequest, Output, OutputStatus, RawResponse, Round, RoundId, SecretSource,
};
