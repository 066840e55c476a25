//! Runtime orchestration for replicated action sessions.
//!
//! This crate wires the deterministic owners from `action-core` into a
//! session of one authority and several replicas, connected by ordered
//! loopback links. Consumers either drive a [`Session`] directly or embed
//! [`Runtime`] and interact through [`RuntimeHandle`].
//!
//! Modules are organized by responsibility:
//! - [`session`] holds the synchronous, deterministic session
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`replication`] provides the links between peers
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod events;
pub mod replication;
pub mod runtime;
pub mod session;

mod workers;

pub use api::{Result, RuntimeError, RuntimeHandle};
pub use events::{ActionEventRecord, Event, EventBus, ReplicationEvent, Topic};
pub use replication::{LinkError, LoopbackLink};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use session::{
    CHARACTER, Dispatch, PLAYER, ParsePeerError, PeerId, PeerState, Session, SessionSnapshot,
};
