//! Topic-based event bus for runtime events.
//!
//! Owner events and replication traffic are published to separate topics so
//! consumers subscribe only to what they need.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{ActionEventRecord, ReplicationEvent};
