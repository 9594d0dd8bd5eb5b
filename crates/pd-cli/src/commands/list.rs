//! List command implementation

use anyhow::Result;

use pd_coordinator::LifecycleCoordinator;

use crate::output::format_vms;

/// Execute the list command
pub async fn list_command(coordinator: &LifecycleCoordinator, long: bool) -> Result<()> {
    coordinator.load_vms().await?;

    let label = coordinator.cluster_label().await;
    let vms = coordinator.vms();

    println!("Cluster: {}", label);
    println!("{}", format_vms(&vms, long));

    Ok(())
}
