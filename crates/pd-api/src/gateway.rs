//! The gateway contract consumed by the lifecycle coordinator

use async_trait::async_trait;

use pd_core::{OperationKind, Session, TaskStatus, VirtualMachine};

use crate::error::GatewayResult;

/// Abstraction over the cluster's remote API.
///
/// One method per remote action. Every method takes the session
/// credentials per call, performs exactly one logical request (plus
/// best-effort enrichment where noted), and never retries.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Exchange credentials for a ticket and anti-forgery token
    async fn authenticate(
        &self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> GatewayResult<Session>;

    /// Fetch all QEMU guests in the cluster, enriched with console
    /// capability and (for running guests) the agent-reported address.
    /// Enrichment failures are swallowed; defaults stand in.
    async fn list_vms(&self, session: &Session) -> GatewayResult<Vec<VirtualMachine>>;

    /// Issue a state-changing command; returns the UPID task handle the
    /// hypervisor assigned on acceptance
    async fn vm_command(
        &self,
        session: &Session,
        node: &str,
        vmid: u32,
        kind: OperationKind,
    ) -> GatewayResult<String>;

    /// Query the status of an asynchronous hypervisor task
    async fn task_status(
        &self,
        session: &Session,
        node: &str,
        upid: &str,
    ) -> GatewayResult<TaskStatus>;

    /// Request a console access payload for the external viewer
    async fn console_config(
        &self,
        session: &Session,
        node: &str,
        vmid: u32,
    ) -> GatewayResult<String>;

    /// Resolve a display name for the cluster, falling back to the first
    /// node name when the endpoint is not clustered
    async fn cluster_name(&self, session: &Session) -> GatewayResult<String>;
}
