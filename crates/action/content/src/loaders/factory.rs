//! Content factory for loading a session's data directory.

use std::path::{Path, PathBuf};

use crate::config::SessionConfig;
use crate::loaders::{ActionCatalog, ConfigLoader, LoadResult};

/// Loads all action content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── session.toml
/// └── actions/
///     ├── attack.ron
///     └── movement.ron
/// ```
///
/// Missing files fall back to the embedded defaults.
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load session configuration from `session.toml`.
    pub fn load_config(&self) -> LoadResult<SessionConfig> {
        let path = self.data_dir.join("session.toml");
        if path.is_file() {
            ConfigLoader::load(&path)
        } else {
            Ok(SessionConfig::default())
        }
    }

    /// Load the action catalog from `actions/`.
    pub fn load_catalog(&self) -> LoadResult<ActionCatalog> {
        let dir = self.data_dir.join("actions");
        if dir.is_dir() {
            ActionCatalog::load_dir(&dir)
        } else {
            ActionCatalog::builtin()
        }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
