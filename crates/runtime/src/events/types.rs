//! Event types for different topics.

use serde::{Deserialize, Serialize};

use action_core::{ActionEvent, ActionRequest, ActionStateUpdate, ReplicationOutcome};

use crate::session::PeerId;

/// An owner event, tagged with the peer it happened on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEventRecord {
    pub peer: PeerId,
    pub event: ActionEvent,
}

/// Traffic between the authority and its replicas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicationEvent {
    /// A replica processed an update from the authority.
    UpdateApplied {
        peer: PeerId,
        update: ActionStateUpdate,
        outcome: ReplicationOutcome,
    },

    /// The authority executed a request forwarded by a replica.
    RequestHandled {
        from: PeerId,
        request: ActionRequest,
        admitted: bool,
    },

    /// A replica joined mid-session and was sent a snapshot.
    ReplicaJoined { peer: PeerId, actions: usize },
}
