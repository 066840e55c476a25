//! Pluggable per-action behavior.
//!
//! Concrete payloads (damage, projectiles, movement modifiers) live outside
//! this crate and attach to an [`Action`](super::Action) through
//! [`ActionBehavior`]. The framework keeps the lifecycle; the behavior only
//! widens the start gate and reacts to transitions.

use std::collections::HashMap;
use std::fmt;

use crate::state::{EntityRef, OwnerId, Role, SimTime};
use crate::tag::{ActiveTags, Tag};

/// Read-only view handed to behavior hooks.
#[derive(Clone, Copy, Debug)]
pub struct ActionView<'a> {
    pub owner: OwnerId,
    pub role: Role,
    pub now: SimTime,
    pub action: &'a Tag,
    pub active_tags: &'a ActiveTags,
    pub start_time: Option<SimTime>,
}

/// Extension point for concrete actions.
///
/// `can_start` may only add rejections: the running check and the blocked-tag
/// check always run first and cannot be bypassed. Hooks run on every
/// participant where the transition is applied, including replicas replaying
/// replicated state, so they must not assume authority.
pub trait ActionBehavior: Send {
    /// Additional start condition, evaluated on the authority only.
    fn can_start(&self, _view: &ActionView<'_>, _instigator: EntityRef) -> bool {
        true
    }

    /// Runs after the start transition and its broadcast.
    fn on_started(&mut self, _view: &ActionView<'_>, _instigator: EntityRef) {}

    /// Runs after the stop transition and its broadcast.
    fn on_stopped(&mut self, _view: &ActionView<'_>, _instigator: EntityRef) {}
}

/// Behavior with no payload. Used when a catalog entry names none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBehavior;

impl ActionBehavior for NoopBehavior {}

/// Rejects a restart until `seconds` have passed since the last stop.
#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    seconds: f64,
    last_stopped: Option<SimTime>,
}

impl Cooldown {
    pub const DEFAULT_SECONDS: f64 = 2.0;

    pub fn new(seconds: f64) -> Self {
        Self {
            seconds,
            last_stopped: None,
        }
    }

    /// Seconds left before the action may start again.
    pub fn remaining(&self, now: SimTime) -> f64 {
        self.last_stopped
            .map(|stopped| (self.seconds - now.since(stopped)).max(0.0))
            .unwrap_or(0.0)
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SECONDS)
    }
}

impl ActionBehavior for Cooldown {
    fn can_start(&self, view: &ActionView<'_>, _instigator: EntityRef) -> bool {
        self.remaining(view.now) <= 0.0
    }

    fn on_stopped(&mut self, view: &ActionView<'_>, _instigator: EntityRef) {
        self.last_stopped = Some(view.now);
    }
}

type BehaviorFactory = Box<dyn Fn() -> Box<dyn ActionBehavior> + Send + Sync>;

/// Maps behavior keys used by content catalogs to constructors.
#[derive(Default)]
pub struct BehaviorRegistry {
    factories: HashMap<String, BehaviorFactory>,
}

impl BehaviorRegistry {
    /// Key of the built-in [`Cooldown`] behavior.
    pub const COOLDOWN: &'static str = "cooldown";

    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the behaviors shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Self::COOLDOWN, || Box::new(Cooldown::default()));
        registry
    }

    /// Registers (or replaces) a constructor under `key`.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ActionBehavior> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Box::new(factory));
    }

    /// Builds a fresh behavior instance, or `None` for an unknown key.
    pub fn create(&self, key: &str) -> Option<Box<dyn ActionBehavior>> {
        self.factories.get(key).map(|factory| factory())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("BehaviorRegistry")
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_counts_from_last_stop() {
        let tags = ActiveTags::new();
        let name = Tag::new("Action.Blackhole").unwrap();
        let view_at = |now: f64| ActionView {
            owner: OwnerId(1),
            role: Role::Authority,
            now: SimTime(now),
            action: &name,
            active_tags: &tags,
            start_time: None,
        };

        let mut cooldown = Cooldown::new(1.5);
        assert!(cooldown.can_start(&view_at(0.0), EntityRef(1)));

        cooldown.on_stopped(&view_at(4.0), EntityRef(1));
        assert!(!cooldown.can_start(&view_at(5.0), EntityRef(1)));
        assert_eq!(cooldown.remaining(SimTime(5.0)), 0.5);
        assert!(cooldown.can_start(&view_at(5.5), EntityRef(1)));
    }

    #[test]
    fn registry_builds_fresh_instances() {
        let registry = BehaviorRegistry::with_builtins();
        assert!(registry.contains(BehaviorRegistry::COOLDOWN));
        assert!(registry.create(BehaviorRegistry::COOLDOWN).is_some());
        assert!(registry.create("missing").is_none());
    }
}
