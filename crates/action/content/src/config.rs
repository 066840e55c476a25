//! Session configuration and input bindings.
//!
//! Everything here is plain data; [`crate::loaders::ConfigLoader`] reads it
//! from TOML and the runtime turns it into a running session.

use action_core::{OwnerConfig, RequestKind, Tag};

/// One input mapped to a start or stop of a named action.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Binding {
    pub input: String,
    pub command: RequestKind,
    pub action: Tag,
}

impl Binding {
    pub fn new(input: impl Into<String>, command: RequestKind, action: Tag) -> Self {
        Self {
            input: input.into(),
            command,
            action,
        }
    }
}

/// Input name to action command table.
///
/// Input names are unique; inserting an existing name replaces its binding.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct InputBindings {
    bindings: Vec<Binding>,
}

impl InputBindings {
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// The character's standard layout: sprint is held, everything else fires on press.
    pub fn defaults() -> Self {
        let mut bindings = Self::empty();
        let table = [
            ("sprint_pressed", RequestKind::Start, "Action.Sprint"),
            ("sprint_released", RequestKind::Stop, "Action.Sprint"),
            ("primary_attack", RequestKind::Start, "Action.PrimaryAttack"),
            ("blackhole", RequestKind::Start, "Action.Blackhole"),
            ("dash", RequestKind::Start, "Action.Dash"),
        ];
        for (input, command, action) in table {
            if let Ok(action) = Tag::new(action) {
                bindings.insert(Binding::new(input, command, action));
            }
        }
        bindings
    }

    /// Adds `binding`, returning the one it replaced.
    pub fn insert(&mut self, binding: Binding) -> Option<Binding> {
        match self.bindings.iter_mut().find(|b| b.input == binding.input) {
            Some(existing) => Some(std::mem::replace(existing, binding)),
            None => {
                self.bindings.push(binding);
                None
            }
        }
    }

    pub fn resolve(&self, input: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.input == input)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for InputBindings {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Parameters of a simulated session: one authority, N replicas.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Simulated seconds per tick.
    pub tick_seconds: f64,
    /// Replicas present when the session starts.
    pub replicas: usize,
    /// Ticks an update spends on a link before delivery. Order is preserved.
    pub latency_ticks: u32,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Default `tracing` directive for binaries, e.g. `"action_core=debug"`.
    pub log_filter: Option<String>,
    pub owner: OwnerConfig,
    pub bindings: InputBindings,
}

impl SessionConfig {
    pub const DEFAULT_TICK_SECONDS: f64 = 0.1;
    pub const DEFAULT_REPLICAS: usize = 1;
    pub const DEFAULT_LATENCY_TICKS: u32 = 2;
    pub const DEFAULT_EVENT_BUFFER: usize = 100;
    pub const DEFAULT_COMMAND_BUFFER: usize = 32;
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_seconds: Self::DEFAULT_TICK_SECONDS,
            replicas: Self::DEFAULT_REPLICAS,
            latency_ticks: Self::DEFAULT_LATENCY_TICKS,
            event_buffer_size: Self::DEFAULT_EVENT_BUFFER,
            command_buffer_size: Self::DEFAULT_COMMAND_BUFFER,
            log_filter: None,
            owner: OwnerConfig::default(),
            bindings: InputBindings::defaults(),
        }
    }
}
