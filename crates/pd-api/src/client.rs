//! HTTP implementation of the gateway contract

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use pd_core::{OperationKind, Session, TaskStatus, VirtualMachine};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ClusterGateway;
use crate::wire::{
    first_guest_ipv4, AgentNetworkData, AuthData, ClusterStatusEntry, Data, NodeEntry,
    VmConfigRecord, VmRecord,
};

/// Cluster gateway backed by the Proxmox VE REST API.
///
/// Holds a single HTTP client; session credentials are supplied per
/// call. Certificate verification is relaxed only when the operator has
/// opted in via configuration, for clusters running on self-signed
/// certificates.
pub struct ProxmoxGateway {
    http: reqwest::Client,
}

impl ProxmoxGateway {
    /// Build a gateway.
    ///
    /// `accept_invalid_certs` disables TLS certificate verification for
    /// the target host. Intended for operator-controlled clusters on
    /// trusted internal networks.
    pub fn new(accept_invalid_certs: bool) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { http })
    }

    fn get(&self, session: &Session, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", session.origin(), path))
            .header("Cookie", format!("PVEAuthCookie={}", session.ticket))
    }

    fn post(&self, session: &Session, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", session.origin(), path))
            .header("Cookie", format!("PVEAuthCookie={}", session.ticket))
            .header("CSRFPreventionToken", &session.csrf_token)
    }

    /// Fetch the guest's config record (console capability, CPU topology)
    async fn vm_config(
        &self,
        session: &Session,
        node: &str,
        vmid: u32,
    ) -> GatewayResult<VmConfigRecord> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/config", node, vmid);
        let response = check_status(self.get(session, &path).send().await?).await?;
        parse_data(response).await
    }

    /// Ask the guest agent for the first routable IPv4 address.
    /// Returns `None` on any failure; the agent is frequently absent.
    async fn guest_ip(&self, session: &Session, node: &str, vmid: u32) -> Option<String> {
        let path = format!(
            "/api2/json/nodes/{}/qemu/{}/agent/network-get-interfaces",
            node, vmid
        );
        let response = self.get(session, &path).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let payload: Data<AgentNetworkData> = response.json().await.ok()?;
        first_guest_ipv4(&payload.data.result?)
    }

    /// Best-effort enrichment of one listed guest. Failures leave the
    /// record's defaults in place.
    async fn enrich(&self, session: &Session, mut vm: VirtualMachine) -> VirtualMachine {
        match self.vm_config(session, &vm.node, vm.vmid).await {
            Ok(config) => {
                vm.console_capable = config.console_capable();
                if vm.cpus.is_none() {
                    vm.cpus = Some(config.cpu_count());
                }
            }
            Err(e) => {
                tracing::debug!("Config lookup for VM {} failed: {}", vm.vmid, e);
            }
        }

        if vm.is_running() {
            vm.guest_ip = self.guest_ip(session, &vm.node, vm.vmid).await;
        }

        vm
    }
}

/// Normalize a non-success HTTP status into `GatewayError::Remote`,
/// carrying whatever body the server supplied
async fn check_status(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(GatewayError::Remote {
        status: status.as_u16(),
        message,
    })
}

/// Unwrap the `{ "data": ... }` envelope of a JSON payload
async fn parse_data<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let body = response.text().await?;
    let envelope: Data<T> =
        serde_json::from_str(&body).map_err(|e| GatewayError::Parse(e.to_string()))?;
    Ok(envelope.data)
}

#[async_trait]
impl ClusterGateway for ProxmoxGateway {
    async fn authenticate(
        &self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> GatewayResult<Session> {
        let url = format!("https://{}:{}/api2/json/access/ticket", host, port);
        let params = [("username", username), ("password", password)];

        let response = self.http.post(&url).form(&params).send().await?;
        if !response.status().is_success() {
            return Err(GatewayError::Auth(format!(
                "cluster returned status {}",
                response.status()
            )));
        }

        let auth: AuthData = parse_data(response).await?;
        tracing::debug!("Authenticated against {} as {}", host, username);

        Ok(Session {
            host: host.to_string(),
            port,
            username: username.to_string(),
            ticket: auth.ticket,
            csrf_token: auth.csrf_token,
        })
    }

    async fn list_vms(&self, session: &Session) -> GatewayResult<Vec<VirtualMachine>> {
        let response = self
            .get(session, "/api2/json/cluster/resources?type=vm")
            .send()
            .await?;
        let response = check_status(response).await?;
        let records: Vec<VmRecord> = parse_data(response).await?;

        // LXC containers share the resource listing; only QEMU guests
        // are managed here.
        let vms = records
            .into_iter()
            .filter(|r| r.kind == "qemu")
            .map(VmRecord::into_vm);

        Ok(join_all(vms.map(|vm| self.enrich(session, vm))).await)
    }

    async fn vm_command(
        &self,
        session: &Session,
        node: &str,
        vmid: u32,
        kind: OperationKind,
    ) -> GatewayResult<String> {
        let path = format!(
            "/api2/json/nodes/{}/qemu/{}/status/{}",
            node,
            vmid,
            kind.endpoint()
        );
        let response = check_status(self.post(session, &path).send().await?).await?;
        let upid: String = parse_data(response).await?;
        tracing::debug!("Cluster accepted {} for VM {} as task {}", kind, vmid, upid);
        Ok(upid)
    }

    async fn task_status(
        &self,
        session: &Session,
        node: &str,
        upid: &str,
    ) -> GatewayResult<TaskStatus> {
        // UPIDs contain colons and must be percent-encoded in the path
        let path = format!(
            "/api2/json/nodes/{}/tasks/{}/status",
            node,
            urlencoding::encode(upid)
        );
        let response = check_status(self.get(session, &path).send().await?).await?;
        parse_data(response).await
    }

    async fn console_config(
        &self,
        session: &Session,
        node: &str,
        vmid: u32,
    ) -> GatewayResult<String> {
        // This endpoint returns the viewer's .vv file verbatim, not the
        // JSON envelope.
        let path = format!("/api2/spiceconfig/nodes/{}/qemu/{}/spiceproxy", node, vmid);
        let response = self
            .post(session, &path)
            .form(&[("proxy", session.host.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.text().await?)
    }

    async fn cluster_name(&self, session: &Session) -> GatewayResult<String> {
        let response = self.get(session, "/api2/json/cluster/status").send().await?;
        if response.status().is_success() {
            if let Ok(entries) = parse_data::<Vec<ClusterStatusEntry>>(response).await {
                if let Some(cluster) = entries
                    .iter()
                    .find(|e| e.kind == "cluster" && !e.name.is_empty())
                {
                    return Ok(cluster.name.clone());
                }
            }
        }

        // Standalone hosts have no cluster entry; use the node name.
        let response = check_status(self.get(session, "/api2/json/nodes").send().await?).await?;
        let nodes: Vec<NodeEntry> = parse_data(response).await?;
        Ok(nodes
            .first()
            .map(|n| n.node.clone())
            .unwrap_or_else(|| session.host.clone()))
    }
}
