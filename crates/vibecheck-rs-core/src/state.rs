//! Settings persistence for the prompt history.

use crate::error::VibecheckCoreError;
use directories::BaseDirs;
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Namespaced key the engine owns inside the settings file.
pub const STORAGE_KEY: &str = "vibecheck-storage";
/// File name of the default settings file.
pub const SETTINGS_FILENAME: &str = "settings.json";

/// The slice of application state that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Prompt history, newest first.
    #[serde(default)]
    pub prompt_history: Vec<String>,
}

/// Persistent key-value settings abstraction.
pub trait SettingsStore: Send + Sync {
    /// Load persisted state; `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedState>, StateError>;
    /// Persist the state, replacing any previous value.
    fn save(&self, state: &PersistedState) -> Result<(), StateError>;
}

/// Errors returned by the settings store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("settings file is not a JSON object: {0}")]
    NotAnObject(PathBuf),
}

/// JSON file store. The engine only touches [`STORAGE_KEY`]; sibling keys are preserved.
pub struct JsonSettingsStore {
    path: PathBuf,
    /// Serialize read-modify-write cycles on the settings file.
    write_lock: Mutex<()>,
}

impl JsonSettingsStore {
    /// Create a store backed by `path`. The parent directory is created lazily on save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("initialized settings store (path={})", path.display());
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the resolved default or configured location.
    pub fn open(configured: Option<&String>) -> Result<Self, VibecheckCoreError> {
        Ok(Self::new(resolve_settings_path(configured)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StateError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(StateError::Io(err)),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(StateError::NotAnObject(self.path.clone())),
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Option<PersistedState>, StateError> {
        let mut document = self.read_document()?;
        let Some(value) = document.remove(STORAGE_KEY) else {
            debug!("no persisted state (path={})", self.path.display());
            return Ok(None);
        };
        let state: PersistedState = serde_json::from_value(value)?;
        debug!(
            "loaded persisted state (path={}, history={})",
            self.path.display(),
            state.prompt_history.len()
        );
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        document.insert(STORAGE_KEY.to_string(), serde_json::to_value(state)?);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&Value::Object(document))?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "saved persisted state (path={}, history={})",
            self.path.display(),
            state.prompt_history.len()
        );
        Ok(())
    }
}

/// Resolve the settings file path: configured (absolute or cwd-relative), else
/// `~/.vibecheck/settings.json`.
pub fn resolve_settings_path(configured: Option<&String>) -> Result<PathBuf, VibecheckCoreError> {
    let cwd = std::env::current_dir().map_err(VibecheckCoreError::Io)?;
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            return Ok(path);
        }
        debug!(
            "resolving settings path relative to cwd: {}",
            cwd.join(&path).display()
        );
        return Ok(cwd.join(path));
    }
    if let Some(home) = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
        return Ok(home.join(".vibecheck").join(SETTINGS_FILENAME));
    }
    Ok(cwd.join(".vibecheck").join(SETTINGS_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::{
        JsonSettingsStore, PersistedState, STORAGE_KEY, SettingsStore, StateError,
        resolve_settings_path,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_returns_none_when_file_missing() {
        let temp = tempdir().expect("tempdir");
        let store = JsonSettingsStore::new(temp.path().join("settings.json"));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn save_then_load_round_trips_history() {
        let temp = tempdir().expect("tempdir");
        let store = JsonSettingsStore::new(temp.path().join("nested").join("settings.json"));
        let state = PersistedState {
            prompt_history: vec!["a cat".to_string(), "a dog".to_string()],
        };
        store.save(&state).expect("save");
        assert_eq!(store.load().expect("load"), Some(state));
    }

    #[test]
    fn save_preserves_foreign_keys() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{ "theme": "dark" }"#).expect("seed");

        let store = JsonSettingsStore::new(&path);
        store.save(&PersistedState::default()).expect("save");

        let document: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(document["theme"], json!("dark"));
        assert_eq!(document[STORAGE_KEY], json!({ "prompt_history": [] }));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        fs::write(&path, "[1, 2]").expect("seed");
        let store = JsonSettingsStore::new(&path);
        assert!(matches!(store.load(), Err(StateError::NotAnObject(_))));
    }

    #[test]
    fn resolve_settings_path_respects_absolute_and_relative_paths() {
        let temp = tempdir().expect("tempdir");
        let absolute = temp.path().join("settings.json").to_string_lossy().to_string();
        let resolved = resolve_settings_path(Some(&absolute)).expect("absolute");
        assert_eq!(resolved.to_string_lossy(), absolute);

        let relative = "tmp/settings.json".to_string();
        let cwd = std::env::current_dir().expect("cwd");
        let resolved = resolve_settings_path(Some(&relative)).expect("relative");
        assert_eq!(resolved, cwd.join(&relative));
    }
}
