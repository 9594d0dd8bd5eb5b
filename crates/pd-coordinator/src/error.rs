//! Lifecycle operation errors

use std::time::Duration;
use thiserror::Error;

use pd_api::GatewayError;
use pd_core::OperationKind;

/// Errors surfaced by lifecycle operations.
///
/// Every failure path clears the guest's in-flight marker before the
/// error reaches the caller; no pending state survives an error.
#[derive(Debug, Error)]
pub enum OperationError {
    /// No authenticated session is installed; nothing was sent
    #[error("no active session")]
    NoSession,

    /// The guest is not in the published collection
    #[error("VM {0} is not in the published collection")]
    VmNotFound(u32),

    /// Another operation is already pending for this guest
    #[error("VM {vmid} already has a {kind} operation in flight")]
    OperationPending { vmid: u32, kind: OperationKind },

    /// The cluster rejected the command or could not be reached
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The hypervisor executed the command but it failed
    #[error("task finished with exit status \"{0}\"")]
    TaskFailed(String),

    /// The task never reached a terminal state within the deadline
    #[error("task did not finish within {0:?}")]
    TaskTimeout(Duration),

    /// Querying task status failed; polling is not retried
    #[error("task status poll failed: {0}")]
    Poll(#[source] GatewayError),

    /// The guest has no graphical console configured
    #[error("VM {0} has no graphical console configured")]
    ConsoleUnavailable(u32),

    /// Writing the console file or spawning the viewer failed
    #[error("failed to launch console viewer: {0}")]
    Viewer(#[from] std::io::Error),
}

pub type OperationResult<T> = std::result::Result<T, OperationError>;
