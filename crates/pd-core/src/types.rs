//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power state of a guest as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    Running,
    Stopped,
    Paused,
}

impl VmStatus {
    /// Parse a wire status string.
    ///
    /// Unknown values bucket to `Stopped`, matching how the cluster
    /// reports guests on nodes it cannot currently reach.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "running" => VmStatus::Running,
            "paused" => VmStatus::Paused,
            _ => VmStatus::Stopped,
        }
    }

    /// Wire representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            VmStatus::Running => "running",
            VmStatus::Stopped => "stopped",
            VmStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state-changing command the coordinator can issue against a guest.
///
/// Each kind knows its remote endpoint segment and its user-facing
/// labels, so callers never build either from strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Start,
    Stop,
    Suspend,
    Resume,
}

impl OperationKind {
    /// All kinds, in display order
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Start,
        OperationKind::Stop,
        OperationKind::Suspend,
        OperationKind::Resume,
    ];

    /// Path segment of the `/status/{...}` endpoint for this command
    pub fn endpoint(&self) -> &'static str {
        match self {
            OperationKind::Start => "start",
            OperationKind::Stop => "stop",
            OperationKind::Suspend => "suspend",
            OperationKind::Resume => "resume",
        }
    }

    /// Infinitive label for error messages ("failed to start VM ...")
    pub fn label(&self) -> &'static str {
        self.endpoint()
    }

    /// Past-tense label for success notifications ("VM web-01 started")
    pub fn past_tense(&self) -> &'static str {
        match self {
            OperationKind::Start => "started",
            OperationKind::Stop => "stopped",
            OperationKind::Suspend => "suspended",
            OperationKind::Resume => "resumed",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One hypervisor-managed guest, as published to the view layer.
///
/// `vmid` is the join key for every reconciliation step. Published
/// instances are replaced wholesale on refresh and after an operation
/// completes; nothing mutates an entry in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Cluster-unique guest identifier
    pub vmid: u32,
    /// Human-readable name
    pub name: String,
    /// Current power state
    pub status: VmStatus,
    /// Node currently owning the guest
    pub node: String,
    /// Allocated virtual CPU count
    #[serde(default)]
    pub cpus: Option<u32>,
    /// Memory usage in bytes
    #[serde(default)]
    pub mem: Option<u64>,
    /// Maximum memory in bytes
    #[serde(default)]
    pub maxmem: Option<u64>,
    /// Disk usage in bytes
    #[serde(default)]
    pub disk: Option<u64>,
    /// Maximum disk space in bytes
    #[serde(default)]
    pub maxdisk: Option<u64>,
    /// Uptime in seconds, when running
    #[serde(default)]
    pub uptime: Option<u64>,
    /// Free-text labels (semicolon-delimited on the wire)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether a graphical console proxy is configured for this guest
    #[serde(default)]
    pub console_capable: bool,
    /// Guest-agent-reported IPv4 address, when available
    #[serde(default)]
    pub guest_ip: Option<String>,
}

impl VirtualMachine {
    /// Check if the guest is running
    pub fn is_running(&self) -> bool {
        self.status == VmStatus::Running
    }

    /// Check if the guest is paused
    pub fn is_paused(&self) -> bool {
        self.status == VmStatus::Paused
    }

    /// Check if the guest is stopped
    pub fn is_stopped(&self) -> bool {
        self.status == VmStatus::Stopped
    }
}

/// Exit indicator the hypervisor uses for a successfully finished task
pub const TASK_EXIT_OK: &str = "OK";

/// Status of one asynchronous hypervisor-side task.
///
/// A task is identified by an opaque UPID string and is tracked only for
/// the duration of a single polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// `"running"` or `"stopped"`
    pub status: String,
    /// Exit indicator, present once the task has stopped
    #[serde(default)]
    pub exitstatus: Option<String>,
}

impl TaskStatus {
    /// Check if the task is still running
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// Check if the task finished successfully
    pub fn is_success(&self) -> bool {
        !self.is_running() && self.exitstatus.as_deref() == Some(TASK_EXIT_OK)
    }

    /// Check if the task finished with a failure
    pub fn is_failed(&self) -> bool {
        !self.is_running() && !self.is_success()
    }

    /// The exit indicator for a terminal task, if any
    pub fn exit_indicator(&self) -> &str {
        self.exitstatus.as_deref().unwrap_or("")
    }
}

/// An authenticated session against one cluster endpoint.
///
/// Owned by the auth subsystem and handed to the coordinator; read-only
/// to everything below it and supplied per gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Cluster hostname or address
    pub host: String,
    /// API port (8006 on a stock installation)
    pub port: u16,
    /// Authenticated user (e.g. `root@pam`)
    pub username: String,
    /// Auth cookie value
    pub ticket: String,
    /// Anti-forgery token sent on mutating requests
    pub csrf_token: String,
}

impl Session {
    /// Origin of the cluster endpoint (`https://host:port`)
    pub fn origin(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}
