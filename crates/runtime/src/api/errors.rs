//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, owner binding, replication and
//! the loopback links so clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use action_core::{ActionFailure, BindError, ErrorSeverity, ReplicationError};

use crate::replication::LinkError;
use crate::session::PeerId;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("failed to load action content: {0}")]
    Content(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("no binding for input `{input}`")]
    UnknownInput { input: String },

    #[error("no peer {peer} in this session")]
    UnknownPeer { peer: PeerId },
}

impl ActionFailure for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Bind(e) => e.severity(),
            Self::Replication(e) => e.severity(),
            Self::UnknownInput { .. } | Self::UnknownPeer { .. } => ErrorSeverity::Validation,
            Self::Content(_) => ErrorSeverity::Validation,
            Self::CommandChannelClosed
            | Self::ReplyChannelClosed(_)
            | Self::WorkerJoin(_)
            | Self::Link(_) => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::CommandChannelClosed => "RUNTIME_COMMAND_CHANNEL_CLOSED",
            Self::ReplyChannelClosed(_) => "RUNTIME_REPLY_CHANNEL_CLOSED",
            Self::WorkerJoin(_) => "RUNTIME_WORKER_JOIN",
            Self::Content(_) => "RUNTIME_CONTENT",
            Self::Bind(e) => e.error_code(),
            Self::Replication(e) => e.error_code(),
            Self::Link(_) => "RUNTIME_LINK",
            Self::UnknownInput { .. } => "RUNTIME_UNKNOWN_INPUT",
            Self::UnknownPeer { .. } => "RUNTIME_UNKNOWN_PEER",
        }
    }
}
