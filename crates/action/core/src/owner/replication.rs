//! Replication records exchanged between the authority and its replicas.
//!
//! The authority produces one [`ActionStateUpdate`] per transition. The
//! transport is external: anything implementing [`ReplicationChannel`] can
//! carry updates, as long as it preserves per-action order. Replicas feed
//! received updates to [`ActionOwner::apply_replicated`](super::ActionOwner::apply_replicated).
//!
//! Requests travel the other way: a replica never starts or stops an action
//! itself, it queues an [`ActionRequest`] for the authority.

use crate::error::{ActionFailure, ErrorSeverity};
use crate::state::{EntityRef, OwnerId, RunState, SimTime};
use crate::tag::Tag;

/// One replicated change of an action's state.
///
/// `revision` is per action and strictly increasing on the authority. Start
/// time and owner travel alongside the run state for display and diagnostics.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionStateUpdate {
    pub owner: OwnerId,
    pub action: Tag,
    pub revision: u64,
    pub run_state: RunState,
    pub start_time: Option<SimTime>,
}

/// Result of applying an update on a replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplicationOutcome {
    /// The state changed and Start or Stop was replayed.
    Applied,
    /// Newer revision, but the replicated value equals the local one.
    Unchanged,
    /// Revision not newer than the last applied one; dropped.
    Stale,
}

/// Outgoing transport for authority updates.
pub trait ReplicationChannel {
    fn replicate(&mut self, update: &ActionStateUpdate);
}

/// Plain buffer, handy for tests and for fan-out by the caller.
impl ReplicationChannel for Vec<ActionStateUpdate> {
    fn replicate(&mut self, update: &ActionStateUpdate) {
        self.push(update.clone());
    }
}

/// What a forwarded request asks the authority to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequestKind {
    Start,
    Stop,
}

/// A start/stop call made on a replica, to be executed by the authority.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionRequest {
    pub owner: OwnerId,
    pub kind: RequestKind,
    pub instigator: EntityRef,
    pub action: Tag,
}

/// Errors raised while applying replication traffic.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    #[error("update for {received} delivered to {expected}")]
    OwnerMismatch { expected: OwnerId, received: OwnerId },

    #[error("{owner} has no action `{action}`")]
    UnknownAction { owner: OwnerId, action: Tag },

    #[error("{owner} is the authority and does not accept replicated state")]
    AuthorityRejectsReplication { owner: OwnerId },

    #[error("{owner} is a replica and cannot execute forwarded requests")]
    RequestOnReplica { owner: OwnerId },
}

impl ActionFailure for ReplicationError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownAction { .. } | Self::OwnerMismatch { .. } => ErrorSeverity::Internal,
            Self::AuthorityRejectsReplication { .. } | Self::RequestOnReplica { .. } => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::OwnerMismatch { .. } => "REPLICATION_OWNER_MISMATCH",
            Self::UnknownAction { .. } => "REPLICATION_UNKNOWN_ACTION",
            Self::AuthorityRejectsReplication { .. } => "REPLICATION_ON_AUTHORITY",
            Self::RequestOnReplica { .. } => "REPLICATION_REQUEST_ON_REPLICA",
        }
    }
}
