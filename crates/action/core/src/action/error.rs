//! Action dispatch and binding errors.
//!
//! Dispatch errors are the expected outcome of unchecked player input: the boolean
//! entry points on [`crate::ActionOwner`] collapse them to `false`. The
//! `try_*` variants keep them so callers can tell NotFound from Gated.

use crate::error::{ActionFailure, ErrorSeverity};
use crate::state::OwnerId;
use crate::tag::{Tag, TagSet};

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Reasons a start/stop request was not applied.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// No owned action has this name.
    #[error("action `{action}` not found")]
    NotFound { action: Tag },

    /// The action is already running.
    #[error("action `{action}` is already running")]
    AlreadyRunning { action: Tag },

    /// The owner carries a tag listed in the action's blocked set.
    #[error("action `{action}` blocked by {blocking}")]
    Blocked { action: Tag, blocking: TagSet },

    /// The action's behavior added its own rejection.
    #[error("action `{action}` rejected by its behavior")]
    Rejected { action: Tag },

    /// Stop requested for an action that is not running.
    #[error("action `{action}` is not running")]
    NotRunning { action: Tag },

    /// Called on a replica: the request was queued for the authority and
    /// nothing changed locally.
    #[error("action `{action}` requested on a replica, forwarded to authority")]
    NotAuthority { action: Tag },
}

impl ActionError {
    /// The action the request addressed.
    pub fn action(&self) -> &Tag {
        match self {
            Self::NotFound { action }
            | Self::AlreadyRunning { action }
            | Self::Blocked { action, .. }
            | Self::Rejected { action }
            | Self::NotRunning { action }
            | Self::NotAuthority { action } => action,
        }
    }

    /// True when the action exists but its start gate refused it.
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning { .. } | Self::Blocked { .. } | Self::Rejected { .. }
        )
    }
}

impl ActionFailure for ActionError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Validation,
            Self::AlreadyRunning { .. }
            | Self::Blocked { .. }
            | Self::Rejected { .. }
            | Self::NotRunning { .. }
            | Self::NotAuthority { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ACTION_NOT_FOUND",
            Self::AlreadyRunning { .. } => "ACTION_ALREADY_RUNNING",
            Self::Blocked { .. } => "ACTION_BLOCKED",
            Self::Rejected { .. } => "ACTION_REJECTED",
            Self::NotRunning { .. } => "ACTION_NOT_RUNNING",
            Self::NotAuthority { .. } => "ACTION_NOT_AUTHORITY",
        }
    }
}

// ============================================================================
// Binding Errors
// ============================================================================

/// Errors raised while binding actions to an owner at setup time.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("{owner} is already initialized")]
    AlreadyInitialized { owner: OwnerId },

    #[error("action `{action}` is already bound to {bound_to}")]
    AlreadyBound { action: Tag, bound_to: OwnerId },

    #[error("action name `{action}` appears more than once")]
    DuplicateName { action: Tag },

    #[error("{count} actions exceed the per-owner limit of {max}")]
    TooManyActions { count: usize, max: usize },

    #[error("action `{action}` uses unknown behavior `{behavior}`")]
    UnknownBehavior { action: Tag, behavior: String },
}

impl ActionFailure for BindError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyInitialized { .. } => "BIND_ALREADY_INITIALIZED",
            Self::AlreadyBound { .. } => "BIND_ALREADY_BOUND",
            Self::DuplicateName { .. } => "BIND_DUPLICATE_NAME",
            Self::TooManyActions { .. } => "BIND_TOO_MANY_ACTIONS",
            Self::UnknownBehavior { .. } => "BIND_UNKNOWN_BEHAVIOR",
        }
    }
}
