//! Data-driven action content and session configuration.
//!
//! This crate houses the static action catalog and the loaders for RON/TOML data files:
//! - Action definitions (names, granted and blocking tags, behavior keys) via RON
//! - Session configuration and input bindings via TOML
//!
//! Content is consumed by the runtime when it builds owners; it never appears
//! in replicated state.

pub mod config;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use config::{Binding, InputBindings, SessionConfig};

#[cfg(feature = "loaders")]
pub use loaders::{ActionCatalog, ConfigLoader, ContentFactory};
