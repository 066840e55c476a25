//! Common error infrastructure for action-core.
//!
//! Domain-specific errors (e.g., `ActionError`, `ReplicationError`) are defined
//! next to the operations that produce them. This module only holds the shared
//! classification used by every error type in the crate.
//!
//! None of the errors here is fatal. Failed lookups and rejected starts are
//! ordinary outcomes of input handling.

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the same request may succeed later (tag gate, action busy)
/// - **Validation**: the request itself is wrong (unknown action, wrong owner)
/// - **Internal**: an inconsistency between participants that should be logged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Retry may succeed once the owner's state changes.
    ///
    /// Examples: blocked by `Status.Stunned`, action already running
    Recoverable,

    /// Invalid input, retrying unchanged will fail again.
    ///
    /// Examples: unknown action name, malformed tag
    Validation,

    /// Participants disagree about state.
    ///
    /// Examples: replicated update addressed to another owner
    Internal,
}

impl ErrorSeverity {
    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates a desync or a bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// Common trait for all action-core errors.
///
/// # Implementation Guidelines
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
/// - Keep error codes stable: they end up in logs and tests
pub trait ActionFailure: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
