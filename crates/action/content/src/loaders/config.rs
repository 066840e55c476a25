//! Session configuration loader.

use std::path::Path;

use crate::config::SessionConfig;
use crate::loaders::{LoadResult, read_file};

/// Loader for session configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a [`SessionConfig`] from a TOML file.
    ///
    /// Missing keys fall back to [`SessionConfig::default`]. A file that
    /// declares any `[[bindings]]` replaces the default binding table.
    pub fn load(path: &Path) -> LoadResult<SessionConfig> {
        let content = read_file(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid session config {}: {}", path.display(), e))
    }

    pub fn from_toml_str(content: &str) -> LoadResult<SessionConfig> {
        let config: SessionConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &SessionConfig) -> LoadResult<()> {
        anyhow::ensure!(
            config.tick_seconds.is_finite() && config.tick_seconds > 0.0,
            "tick_seconds must be a positive number, got {}",
            config.tick_seconds
        );
        anyhow::ensure!(
            config.event_buffer_size > 0,
            "event_buffer_size must be at least 1"
        );
        anyhow::ensure!(
            config.command_buffer_size > 0,
            "command_buffer_size must be at least 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use action_core::RequestKind;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConfigLoader::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn load_reads_owner_table_and_bindings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
tick_seconds = 0.05
replicas = 3
latency_ticks = 0
log_filter = "action_core=debug"

[owner]
strict_stop = true

[[bindings]]
input = "roll"
command = "start"
action = "Action.Dash"
"#
        )
        .unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.tick_seconds, 0.05);
        assert_eq!(config.replicas, 3);
        assert_eq!(config.latency_ticks, 0);
        assert_eq!(config.event_buffer_size, SessionConfig::DEFAULT_EVENT_BUFFER);
        assert_eq!(config.log_filter.as_deref(), Some("action_core=debug"));
        assert!(config.owner.strict_stop);

        assert_eq!(config.bindings.len(), 1);
        let roll = config.bindings.resolve("roll").unwrap();
        assert_eq!(roll.command, RequestKind::Start);
        assert_eq!(roll.action.as_str(), "Action.Dash");
    }

    #[test]
    fn rejects_non_positive_tick() {
        let err = ConfigLoader::from_toml_str("tick_seconds = 0.0").unwrap_err();
        assert!(err.to_string().contains("tick_seconds"));
    }

    #[test]
    fn rejects_malformed_action_name() {
        let source = r#"
[[bindings]]
input = "dash"
command = "start"
action = "Action..Dash"
"#;
        assert!(ConfigLoader::from_toml_str(source).is_err());
    }

    #[test]
    fn bundled_session_file_is_valid() {
        let config = ConfigLoader::from_toml_str(include_str!("../../data/session.toml")).unwrap();
        assert_eq!(config.bindings, crate::InputBindings::defaults());
    }
}
