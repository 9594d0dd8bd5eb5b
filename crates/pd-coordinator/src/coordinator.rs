//! The VM lifecycle operation coordinator
//!
//! `LifecycleCoordinator` is the public surface the view layer calls.
//! It owns the published VM collection and the in-flight registry, and
//! drives every accepted command through issue → poll → reconcile →
//! publish, settling all errors at this boundary.
//!
//! # Concurrency Model
//!
//! Operations on different guests run as independent futures; the only
//! shared state is the in-flight registry and the published collection,
//! both keyed by vmid with atomic per-entry updates. Within a single
//! operation the steps are strictly ordered, and reconciliation always
//! compares against the status captured before the command was issued.
//! Cancellation is not supported: once the cluster accepts a command,
//! polling runs to completion or timeout.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use pd_api::ClusterGateway;
use pd_core::config::{ClientConfig, PollingConfig};
use pd_core::{OperationKind, Session, VirtualMachine, VmStatus};

use crate::error::{OperationError, OperationResult};
use crate::inflight::InFlightRegistry;
use crate::notify::Notification;
use crate::poller::{poll_task, PollPolicy};
use crate::reconcile::{await_status_change, ReconcilePolicy};
use crate::store::VmStore;
use crate::viewer;

/// Capacity of the notification channel. Notifications are transient;
/// subscribers that fall behind lose the oldest first.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Coordinates lifecycle operations against one cluster.
///
/// Cheap to share: hold it in an `Arc` and call operations from any
/// task. The view layer reads snapshots via [`vms`](Self::vms) and the
/// in-flight accessors, and listens on [`subscribe`](Self::subscribe).
pub struct LifecycleCoordinator {
    gateway: Arc<dyn ClusterGateway>,
    session: RwLock<Option<Session>>,
    store: VmStore,
    in_flight: InFlightRegistry,
    notifications: broadcast::Sender<Notification>,
    polling: PollingConfig,
    viewer_command: String,
}

impl LifecycleCoordinator {
    /// Create a coordinator over the given gateway
    pub fn new(gateway: Arc<dyn ClusterGateway>, config: &ClientConfig) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            gateway,
            session: RwLock::new(None),
            store: VmStore::new(),
            in_flight: InFlightRegistry::new(),
            notifications,
            polling: config.polling.clone(),
            viewer_command: config.console.viewer.clone(),
        }
    }

    // --- session handoff ---------------------------------------------

    /// Install the session produced by the auth subsystem
    pub async fn set_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    /// Drop the current session; subsequent operations fail fast
    pub async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    /// Whether an authenticated session is installed
    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn require_session(&self) -> OperationResult<Session> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(OperationError::NoSession)
    }

    // --- read surface ------------------------------------------------

    /// Snapshot of the published collection, sorted by vmid
    pub fn vms(&self) -> Vec<VirtualMachine> {
        self.store.snapshot()
    }

    /// Look up one published guest
    pub fn vm(&self, vmid: u32) -> Option<VirtualMachine> {
        self.store.get(vmid)
    }

    /// Whether any operation is pending for this guest
    pub fn is_in_flight(&self, vmid: u32) -> bool {
        self.in_flight.contains(vmid)
    }

    /// The operation pending for a guest, if any
    pub fn pending_kind(&self, vmid: u32) -> Option<OperationKind> {
        self.in_flight.pending_kind(vmid)
    }

    /// Guests with a pending operation of the given kind
    pub fn in_flight(&self, kind: OperationKind) -> Vec<u32> {
        self.in_flight.ids_for(kind)
    }

    /// Subscribe to transient notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    fn notify(&self, notification: Notification) {
        // No subscriber is fine; notifications are transient.
        let _ = self.notifications.send(notification);
    }

    // --- operations --------------------------------------------------

    /// Fetch the full listing and publish it.
    ///
    /// In-flight markers are untouched: a bulk refresh must not cancel
    /// or hide operations already in progress. A pending operation's
    /// final per-id write still lands after this refresh.
    pub async fn load_vms(&self) -> OperationResult<usize> {
        let session = self.require_session().await?;
        let vms = self.gateway.list_vms(&session).await?;
        let count = vms.len();
        self.store.replace_all(vms);
        tracing::info!("Published {} VMs", count);
        self.notify(Notification::VmsRefreshed { count });
        Ok(count)
    }

    /// Start a guest. A paused guest is resumed instead; it cannot be
    /// started.
    pub async fn start_vm(&self, vmid: u32) -> OperationResult<()> {
        self.run_operation(vmid, OperationKind::Start).await
    }

    /// Stop a guest
    pub async fn stop_vm(&self, vmid: u32) -> OperationResult<()> {
        self.run_operation(vmid, OperationKind::Stop).await
    }

    /// Suspend (pause) a guest
    pub async fn suspend_vm(&self, vmid: u32) -> OperationResult<()> {
        self.run_operation(vmid, OperationKind::Suspend).await
    }

    /// Resume a paused guest
    pub async fn resume_vm(&self, vmid: u32) -> OperationResult<()> {
        self.run_operation(vmid, OperationKind::Resume).await
    }

    /// Fetch a console payload and launch the external viewer, detached
    pub async fn connect_vm(&self, vmid: u32) -> OperationResult<()> {
        let session = self.require_session().await?;
        let vm = self
            .store
            .get(vmid)
            .ok_or(OperationError::VmNotFound(vmid))?;

        let result = self.launch_console(&session, &vm).await;
        match result {
            Ok(()) => {
                self.notify(Notification::ConsoleLaunched {
                    vmid,
                    name: vm.name,
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to connect to VM {}: {}", vmid, e);
                self.notify(Notification::ConsoleFailed {
                    vmid,
                    name: vm.name,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Display name for the connected cluster. Best-effort: any failure
    /// is swallowed and the session host substituted.
    pub async fn cluster_label(&self) -> String {
        let Some(session) = self.session.read().await.clone() else {
            return String::new();
        };
        match self.gateway.cluster_name(&session).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("Cluster name lookup failed: {}", e);
                session.host
            }
        }
    }

    // --- internals ---------------------------------------------------

    async fn launch_console(&self, session: &Session, vm: &VirtualMachine) -> OperationResult<()> {
        // Capability is checked before any network call; a guest without
        // a SPICE adapter can never serve a console.
        if !vm.console_capable {
            return Err(OperationError::ConsoleUnavailable(vm.vmid));
        }

        let payload = self.gateway.console_config(session, &vm.node, vm.vmid).await?;
        let path = viewer::launch_viewer(&self.viewer_command, vm.vmid, &payload)?;
        tracing::info!(
            "Console viewer launched for VM {} ({})",
            vm.vmid,
            path.display()
        );
        Ok(())
    }

    /// Issue one lifecycle command and drive it to completion
    async fn run_operation(&self, vmid: u32, requested: OperationKind) -> OperationResult<()> {
        let session = self.require_session().await?;

        let vm = self
            .store
            .get(vmid)
            .ok_or(OperationError::VmNotFound(vmid))?;

        // Captured before the command is issued; reconciliation compares
        // against this value, never a later read.
        let original_status = vm.status;
        let kind = dispatch(requested, original_status);

        self.in_flight
            .claim(vmid, kind)
            .map_err(|pending| OperationError::OperationPending {
                vmid,
                kind: pending,
            })?;
        tracing::info!("Issuing {} for VM {} ({}) on {}", kind, vmid, vm.name, vm.node);

        let result = self.drive(&session, &vm, kind, original_status).await;
        // The marker is dropped on every path; a stuck pending entry
        // would disable the guest's controls forever.
        self.in_flight.clear(vmid);

        match result {
            Ok(()) => {
                tracing::info!("VM {} {}", vmid, kind.past_tense());
                self.notify(Notification::OperationSucceeded {
                    vmid,
                    name: vm.name.clone(),
                    kind,
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to {} VM {}: {}", kind.label(), vmid, e);
                self.notify(Notification::OperationFailed {
                    vmid,
                    name: vm.name.clone(),
                    kind,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session: &Session,
        vm: &VirtualMachine,
        kind: OperationKind,
        original_status: VmStatus,
    ) -> OperationResult<()> {
        let upid = self
            .gateway
            .vm_command(session, &vm.node, vm.vmid, kind)
            .await?;

        poll_task(
            self.gateway.as_ref(),
            session,
            &vm.node,
            &upid,
            self.poll_policy(),
        )
        .await?;

        // Changed or best-effort, the reconciled entity replaces the
        // published one; if the guest was never observed the existing
        // entry stands until the next refresh.
        if let Some(fresh) = await_status_change(
            self.gateway.as_ref(),
            session,
            vm.vmid,
            original_status,
            self.reconcile_policy(),
        )
        .await
        {
            self.store.upsert(fresh);
        }

        Ok(())
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.polling.task_interval,
            deadline: self.polling.task_deadline,
        }
    }

    fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            interval: self.polling.reconcile_interval,
            deadline: self.polling.reconcile_deadline,
        }
    }
}

/// Status-dependent dispatch: a paused guest cannot be started, only
/// resumed. Every other request maps to its own command.
fn dispatch(requested: OperationKind, status: VmStatus) -> OperationKind {
    match (requested, status) {
        (OperationKind::Start, VmStatus::Paused) => OperationKind::Resume,
        (kind, _) => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_start_on_paused_resumes() {
        assert_eq!(
            dispatch(OperationKind::Start, VmStatus::Paused),
            OperationKind::Resume
        );
        assert_eq!(
            dispatch(OperationKind::Start, VmStatus::Stopped),
            OperationKind::Start
        );
    }

    #[test]
    fn test_dispatch_stop_and_suspend_map_directly() {
        assert_eq!(
            dispatch(OperationKind::Stop, VmStatus::Paused),
            OperationKind::Stop
        );
        assert_eq!(
            dispatch(OperationKind::Suspend, VmStatus::Running),
            OperationKind::Suspend
        );
        assert_eq!(
            dispatch(OperationKind::Resume, VmStatus::Paused),
            OperationKind::Resume
        );
    }
}
