//! Locating and reading config layers.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SYSTEM_CONFIG_PATH, SchemaMode, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// `~/.vibecheck/vibecheck.json5`, when a home directory is known.
pub(super) fn user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}

/// Platform system config path, if the platform has one.
pub(super) fn system_config_path() -> Option<PathBuf> {
    SYSTEM_CONFIG_PATH.map(PathBuf::from)
}

/// Canonical form of `path`; a missing path is kept as given.
pub(super) fn canonical_or_given(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(err.into()),
    }
}

/// Read a layer that may be absent. Missing files are skipped, not errors.
pub(super) fn read_optional(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<Option<LoadedLayer>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_layer(source, path, &contents).map(Some),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(
                "config layer absent (source={}, path={})",
                source.name(),
                path.display()
            );
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Read a layer that must exist.
pub(super) fn read_required(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_layer(source, path, &contents)
}

fn parse_layer(
    source: ConfigLayerSource,
    path: &Path,
    contents: &str,
) -> Result<LoadedLayer, ConfigError> {
    debug!(
        "parsing config layer (source={}, path={}, len={})",
        source.name(),
        path.display(),
        contents.len()
    );
    let value: Value = json5::from_str(contents)?;
    let label = format!("{}({})", source.name(), path.display());
    schema::validate_layer_schema(&value, SchemaMode::Partial, &label)?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    })
}
