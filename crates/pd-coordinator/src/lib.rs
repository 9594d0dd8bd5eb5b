//! VM lifecycle operation coordination
//!
//! The coordinator issues state-changing commands (start/stop/suspend/
//! resume) against the cluster, tracks per-guest in-flight status so
//! concurrent operations on different guests do not interfere, and
//! drives each accepted command through a two-phase completion protocol:
//!
//! 1. poll the hypervisor task the command returned until it reaches a
//!    terminal state;
//! 2. re-fetch the authoritative listing until the guest's observable
//!    status diverges from its pre-command value (bounded, best-effort).
//!
//! The view layer consumes the published collection, the per-kind
//! in-flight sets, and a transient notification channel; it never holds
//! mutable state of its own.

pub mod coordinator;
pub mod error;
pub mod inflight;
pub mod notify;
pub mod poller;
pub mod reconcile;
pub mod store;
pub mod viewer;

pub use coordinator::LifecycleCoordinator;
pub use error::{OperationError, OperationResult};
pub use inflight::InFlightRegistry;
pub use notify::Notification;
pub use poller::{poll_task, PollPolicy};
pub use reconcile::{await_status_change, ReconcilePolicy};
pub use store::VmStore;
