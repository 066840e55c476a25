//! Action lifecycle, tag gating and replication rules shared by every
//! participant of a networked simulation.
//!
//! `action-core` defines how a named action starts and stops on its owner,
//! how the owner's hierarchical tags admit or block it, and how an
//! authoritative owner's transitions are replayed on replicas. It is pure
//! and synchronous: transports, clocks and schedulers live in the runtime.
//!
//! All mutation flows through [`ActionOwner`]; actions are never exposed
//! outside of it.
pub mod action;
pub mod config;
pub mod error;
pub mod owner;
pub mod state;
pub mod tag;

pub use action::{
    Action, ActionBehavior, ActionDef, ActionError, ActionStatus, ActionView, BehaviorRegistry,
    BindError, Cooldown, NoopBehavior,
};
pub use config::OwnerConfig;
pub use error::{ActionFailure, ErrorSeverity};
pub use owner::ActionOwner;
pub use owner::events::{ActionEvent, ActionEventKind, SubscriptionId};
pub use owner::replication::{
    ActionRequest, ActionStateUpdate, ReplicationChannel, ReplicationError, ReplicationOutcome,
    RequestKind,
};
pub use state::{EntityRef, OwnerId, Role, RunState, SimClock, SimTime};
pub use tag::{ActiveTags, Tag, TagError, TagSet};
