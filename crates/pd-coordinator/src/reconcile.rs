//! Post-task state reconciliation

use std::time::Duration;

use tokio::time::Instant;

use pd_api::ClusterGateway;
use pd_core::{Session, VirtualMachine, VmStatus};

use crate::error::OperationResult;

/// Timing for the status-divergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Interval between list re-fetches
    pub interval: Duration,
    /// Deadline after which the last observation is returned as-is
    pub deadline: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(15),
        }
    }
}

/// Wait for a guest's observable status to diverge from its pre-command
/// value.
///
/// A task reaching its terminal state only means the command executed;
/// the list endpoint can lag behind, and some transitions (a quick
/// resume, for instance) never visibly change the displayed bucket.
/// This loop re-fetches the authoritative listing until the status
/// differs from `original` or the deadline passes, and returns the
/// freshest entity it saw either way. `None` means the guest was never
/// observed at all — every fetch failed or the id vanished from the
/// listing — in which case the caller leaves its published entry alone.
///
/// `original` must be the status captured strictly before the command
/// was issued; comparing against any later read can mistake a stale
/// value for a completed transition.
pub async fn await_status_change(
    gateway: &dyn ClusterGateway,
    session: &Session,
    vmid: u32,
    original: VmStatus,
    policy: ReconcilePolicy,
) -> Option<VirtualMachine> {
    let started = Instant::now();
    let mut last_seen: Option<VirtualMachine> = None;

    while started.elapsed() < policy.deadline {
        match list_one(gateway, session, vmid).await {
            Ok(Some(vm)) => {
                if vm.status != original {
                    tracing::debug!("VM {} now reports {}", vmid, vm.status);
                    return Some(vm);
                }
                last_seen = Some(vm);
            }
            Ok(None) => {
                tracing::debug!("VM {} absent from listing while reconciling", vmid);
            }
            Err(e) => {
                // Fetch failures are non-fatal here; keep trying until
                // the deadline.
                tracing::warn!("Refresh while reconciling VM {} failed: {}", vmid, e);
            }
        }

        tokio::time::sleep(policy.interval).await;
    }

    tracing::debug!(
        "VM {} status unchanged after {:?}; publishing last observation",
        vmid,
        policy.deadline
    );
    last_seen
}

async fn list_one(
    gateway: &dyn ClusterGateway,
    session: &Session,
    vmid: u32,
) -> OperationResult<Option<VirtualMachine>> {
    let vms = gateway.list_vms(session).await?;
    Ok(vms.into_iter().find(|vm| vm.vmid == vmid))
}
