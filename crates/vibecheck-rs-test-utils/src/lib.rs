//! Test helpers shared across Vibecheck crates.

pub mod backend;
pub mod secrets;
pub mod sink;

pub use backend::{FailingBackend, FixedBackend, GatedBackend, HangingBackend, ScriptedBackend};
pub use secrets::StaticSecret;
pub use sink::RecordingSink;
