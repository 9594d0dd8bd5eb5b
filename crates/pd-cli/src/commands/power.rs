//! Lifecycle command implementations (start/stop/suspend/resume)

use anyhow::Result;

use pd_core::OperationKind;
use pd_coordinator::{LifecycleCoordinator, Notification};

use crate::output::{print_error, print_success};

/// Execute one lifecycle operation and wait for its two-phase
/// completion (hypervisor task terminal, then status reconciled).
pub async fn power_command(
    coordinator: &LifecycleCoordinator,
    vmid: u32,
    kind: OperationKind,
) -> Result<()> {
    coordinator.load_vms().await?;

    let Some(vm) = coordinator.vm(vmid) else {
        print_error(&format!("VM {} not found on this cluster", vmid));
        anyhow::bail!("VM {} not found", vmid);
    };

    println!(
        "Waiting for {} of VM {} ({}) to complete...",
        kind.label(),
        vmid,
        vm.name
    );

    let mut rx = coordinator.subscribe();
    let result = match kind {
        OperationKind::Start => coordinator.start_vm(vmid).await,
        OperationKind::Stop => coordinator.stop_vm(vmid).await,
        OperationKind::Suspend => coordinator.suspend_vm(vmid).await,
        OperationKind::Resume => coordinator.resume_vm(vmid).await,
    };

    // Render the coordinator's own notifications so the CLI reports
    // exactly what the view layer would show.
    while let Ok(note) = rx.try_recv() {
        match note {
            Notification::OperationSucceeded { .. } => print_success(&note.message()),
            Notification::OperationFailed { .. } => print_error(&note.message()),
            _ => {}
        }
    }

    result?;

    if let Some(vm) = coordinator.vm(vmid) {
        println!("VM {} is now {}", vm.vmid, vm.status);
    }

    Ok(())
}
