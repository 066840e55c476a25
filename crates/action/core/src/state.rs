//! Identifiers, simulation time and the replicated run state.

use std::fmt;

/// Reference to any entity that can instigate a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityRef(pub u32);

impl EntityRef {
    /// Reserved reference for transitions not caused by a gameplay entity
    /// (session bootstrap, scripted stops).
    pub const WORLD: Self = Self(u32::MAX);

    #[inline]
    pub const fn is_world(self) -> bool {
        self.0 == Self::WORLD.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_world() {
            f.write_str("#world")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Identity of an action owner. Authority and replicas of the same entity
/// share the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OwnerId(pub u32);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Simulation time in seconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: Self = Self(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier` (never negative).
    pub fn since(self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl std::ops::Add<f64> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: f64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// Per-owner simulation clock, advanced by whoever drives the tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimClock {
    now: SimTime,
}

impl SimClock {
    pub fn new(now: SimTime) -> Self {
        Self { now }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Advances by `seconds`. Negative deltas are ignored.
    pub fn advance(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.now = self.now + seconds;
        }
    }

    pub fn set(&mut self, now: SimTime) {
        self.now = now;
    }
}

/// Network role of an owner. Gating and start-time capture depend on this
/// field alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    /// Canonical instance: gates, captures start time, originates updates.
    Authority,
    /// Follower: applies replicated state, forwards requests.
    Replica,
}

impl Role {
    #[inline]
    pub const fn is_authority(self) -> bool {
        matches!(self, Self::Authority)
    }
}

/// The entire network-visible state of an action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunState {
    pub is_running: bool,
    pub instigator: Option<EntityRef>,
}

impl RunState {
    pub const IDLE: Self = Self {
        is_running: false,
        instigator: None,
    };

    pub fn running(instigator: EntityRef) -> Self {
        Self {
            is_running: true,
            instigator: Some(instigator),
        }
    }

    pub fn stopped(instigator: EntityRef) -> Self {
        Self {
            is_running: false,
            instigator: Some(instigator),
        }
    }
}
