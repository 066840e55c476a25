//! Subcommands of the `actionsim` binary.

mod catalog;
mod run;

pub use catalog::ListCatalog;
pub use run::RunScript;

use std::path::PathBuf;

use anyhow::Result;

use action_content::{ActionCatalog, ContentFactory, SessionConfig};

/// Loads session config and catalog from `data_dir`, or the embedded defaults.
pub(crate) fn load_content(data_dir: Option<&PathBuf>) -> Result<(SessionConfig, ActionCatalog)> {
    match data_dir {
        Some(dir) => {
            let factory = ContentFactory::new(dir);
            Ok((factory.load_config()?, factory.load_catalog()?))
        }
        None => Ok((SessionConfig::default(), ActionCatalog::builtin()?)),
    }
}
