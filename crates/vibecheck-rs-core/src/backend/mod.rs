//! Bundled generation backends.

mod credentials;
mod gemini;

pub use credentials::{BackendFactory, EnvSecretSource, LazyBackend};
pub use gemini::GeminiBackend;
