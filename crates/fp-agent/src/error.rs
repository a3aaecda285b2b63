//! Error taxonomy for caller-facing agent operations.
//!
//! Expected failure paths are values, never panics: the host decides
//! whether to retry. Heartbeat-tick failures and index reconciliation
//! failures are logged where they occur and do not surface here at all.

use crate::store::StoreError;

/// Error returned by [`PresenceAgent`](crate::agent::PresenceAgent)
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// Registration was attempted before the process identity was bound.
    /// No state changed and no retry is scheduled; call again after
    /// startup completes.
    #[error("no instance identity bound yet; register only after startup completes")]
    PreconditionNotMet,

    /// A store operation failed. The agent's state is unchanged; the
    /// caller may retry.
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
}
