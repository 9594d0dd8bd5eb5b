//! Console command implementation

use anyhow::Result;

use pd_coordinator::LifecycleCoordinator;

use crate::output::{print_error, print_success};

/// Fetch a console payload for the guest and launch the external
/// viewer, detached from this process
pub async fn console_command(coordinator: &LifecycleCoordinator, vmid: u32) -> Result<()> {
    coordinator.load_vms().await?;

    match coordinator.connect_vm(vmid).await {
        Ok(()) => {
            print_success(&format!("Console viewer launched for VM {}", vmid));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Failed to connect to VM {}: {}", vmid, e));
            Err(e.into())
        }
    }
}
