/// Owner configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OwnerConfig {
    /// When set, `Stop` on an idle action is a no-op: no state write, no
    /// replication update and no stop event. When clear, a second `Stop`
    /// rewrites the state and fires the stop event again (tags are still
    /// removed only once).
    pub strict_stop: bool,
}

impl OwnerConfig {
    // ===== compile-time limits =====
    /// Maximum number of actions a single owner may hold.
    pub const MAX_ACTIONS: usize = 64;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_STRICT_STOP: bool = false;

    pub fn new() -> Self {
        Self {
            strict_stop: Self::DEFAULT_STRICT_STOP,
        }
    }

    pub fn with_strict_stop(strict_stop: bool) -> Self {
        Self { strict_stop }
    }
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
