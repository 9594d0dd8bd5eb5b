//! Transient user-facing notifications

use serde::Serialize;

use pd_core::OperationKind;

/// Notification published on the coordinator's broadcast channel.
///
/// Delivery is fire-and-forget; subscribers that fall behind lose the
/// oldest entries first, and having no subscriber at all is not an
/// error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    /// A lifecycle operation completed and its result was published
    #[serde(rename_all = "camelCase")]
    OperationSucceeded {
        vmid: u32,
        name: String,
        kind: OperationKind,
    },

    /// A lifecycle operation failed; the in-flight marker was cleared
    #[serde(rename_all = "camelCase")]
    OperationFailed {
        vmid: u32,
        name: String,
        kind: OperationKind,
        message: String,
    },

    /// The console viewer was launched for a guest
    #[serde(rename_all = "camelCase")]
    ConsoleLaunched { vmid: u32, name: String },

    /// Launching the console viewer failed
    #[serde(rename_all = "camelCase")]
    ConsoleFailed {
        vmid: u32,
        name: String,
        message: String,
    },

    /// The published collection was refreshed wholesale
    #[serde(rename_all = "camelCase")]
    VmsRefreshed { count: usize },
}

impl Notification {
    /// One-line human-readable rendering, naming the guest and action
    pub fn message(&self) -> String {
        match self {
            Notification::OperationSucceeded { name, kind, .. } => {
                format!("VM {} {}", name, kind.past_tense())
            }
            Notification::OperationFailed {
                name,
                kind,
                message,
                ..
            } => format!("Failed to {} VM {}: {}", kind.label(), name, message),
            Notification::ConsoleLaunched { name, .. } => {
                format!("Console viewer launched for VM {}", name)
            }
            Notification::ConsoleFailed { name, message, .. } => {
                format!("Failed to connect to VM {}: {}", name, message)
            }
            Notification::VmsRefreshed { count } => format!("Loaded {} VMs", count),
        }
    }
}
