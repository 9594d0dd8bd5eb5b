//! Wire records for the Proxmox `{ "data": ... }` envelope

use serde::Deserialize;

use pd_core::{VirtualMachine, VmStatus};

/// The envelope every JSON endpoint wraps its payload in
#[derive(Debug, Deserialize)]
pub(crate) struct Data<T> {
    pub data: T,
}

/// One entry of `GET /cluster/resources?type=vm`
#[derive(Debug, Deserialize)]
pub(crate) struct VmRecord {
    pub vmid: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    pub node: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub maxcpu: Option<u32>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub maxdisk: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl VmRecord {
    /// Convert the raw record into the domain entity.
    ///
    /// Console capability and the guest address are filled in by the
    /// enrichment pass; they default to absent here.
    pub fn into_vm(self) -> VirtualMachine {
        VirtualMachine {
            vmid: self.vmid,
            name: self.name.unwrap_or_else(|| format!("vm-{}", self.vmid)),
            status: VmStatus::parse(&self.status),
            node: self.node,
            cpus: self.maxcpu.filter(|&n| n > 0),
            mem: self.mem,
            maxmem: self.maxmem,
            disk: self.disk,
            maxdisk: self.maxdisk,
            uptime: self.uptime.filter(|&n| n > 0),
            tags: split_tags(self.tags.as_deref().unwrap_or_default()),
            console_capable: false,
            guest_ip: None,
        }
    }
}

/// Split the semicolon-delimited wire tag field, dropping empty segments
pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Subset of `GET /nodes/{node}/qemu/{vmid}/config` we care about
#[derive(Debug, Deserialize)]
pub(crate) struct VmConfigRecord {
    #[serde(default)]
    pub vga: String,
    #[serde(default = "default_one")]
    pub cores: u32,
    #[serde(default = "default_one")]
    pub sockets: u32,
}

fn default_one() -> u32 {
    1
}

impl VmConfigRecord {
    /// A guest can serve a graphical console when its video adapter is a
    /// SPICE-capable one (`qxl`, possibly with a memory suffix)
    pub fn console_capable(&self) -> bool {
        self.vga.to_lowercase().contains("qxl")
    }

    /// Total virtual CPU count from the config
    pub fn cpu_count(&self) -> u32 {
        self.cores * self.sockets
    }
}

/// Payload of `POST /access/ticket`
#[derive(Debug, Deserialize)]
pub(crate) struct AuthData {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: String,
}

/// One entry of `GET /cluster/status`
#[derive(Debug, Deserialize)]
pub(crate) struct ClusterStatusEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One entry of `GET /nodes`
#[derive(Debug, Deserialize)]
pub(crate) struct NodeEntry {
    pub node: String,
}

/// Payload of the guest agent's `network-get-interfaces` call
#[derive(Debug, Deserialize)]
pub(crate) struct AgentNetworkData {
    #[serde(default)]
    pub result: Option<Vec<AgentInterface>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AgentInterface {
    pub name: String,
    #[serde(rename = "ip-addresses", default)]
    pub ip_addresses: Option<Vec<AgentIpAddress>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AgentIpAddress {
    #[serde(rename = "ip-address")]
    pub ip_address: String,
    #[serde(rename = "ip-address-type")]
    pub kind: String,
}

/// Pick the first non-loopback IPv4 address the guest agent reports
pub(crate) fn first_guest_ipv4(interfaces: &[AgentInterface]) -> Option<String> {
    for interface in interfaces {
        if interface.name == "lo" {
            continue;
        }
        if let Some(addresses) = &interface.ip_addresses {
            for addr in addresses {
                if addr.kind == "ipv4" && !addr.ip_address.starts_with("127.") {
                    return Some(addr.ip_address.clone());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags("web;prod"), vec!["web", "prod"]);
        assert_eq!(split_tags("solo"), vec!["solo"]);
        assert!(split_tags("").is_empty());
        assert_eq!(split_tags("a;;b;"), vec!["a", "b"]);
    }

    #[test]
    fn test_vm_record_conversion() {
        let record: Data<Vec<VmRecord>> = serde_json::from_str(
            r#"{"data":[{"vmid":100,"name":"web-01","status":"running","node":"pve1",
                "type":"qemu","maxcpu":4,"mem":1048576,"maxmem":4194304,
                "uptime":3600,"tags":"web;prod"}]}"#,
        )
        .unwrap();

        let vm = record.data.into_iter().next().unwrap().into_vm();
        assert_eq!(vm.vmid, 100);
        assert_eq!(vm.status, VmStatus::Running);
        assert_eq!(vm.cpus, Some(4));
        assert_eq!(vm.tags, vec!["web", "prod"]);
        assert!(!vm.console_capable);
    }

    #[test]
    fn test_vm_record_minimal_fields() {
        let record: VmRecord = serde_json::from_str(
            r#"{"vmid":101,"status":"stopped","node":"pve1"}"#,
        )
        .unwrap();

        let vm = record.into_vm();
        assert_eq!(vm.name, "vm-101");
        assert_eq!(vm.status, VmStatus::Stopped);
        assert!(vm.cpus.is_none());
        assert!(vm.uptime.is_none());
        assert!(vm.tags.is_empty());
    }

    #[test]
    fn test_console_capable_from_vga() {
        let qxl: VmConfigRecord = serde_json::from_str(r#"{"vga":"qxl,memory=32"}"#).unwrap();
        assert!(qxl.console_capable());

        let std: VmConfigRecord = serde_json::from_str(r#"{"vga":"std"}"#).unwrap();
        assert!(!std.console_capable());

        let absent: VmConfigRecord = serde_json::from_str(r#"{"cores":2,"sockets":2}"#).unwrap();
        assert!(!absent.console_capable());
        assert_eq!(absent.cpu_count(), 4);
    }

    #[test]
    fn test_first_guest_ipv4_skips_loopback() {
        let data: AgentNetworkData = serde_json::from_str(
            r#"{"result":[
                {"name":"lo","ip-addresses":[{"ip-address":"127.0.0.1","ip-address-type":"ipv4"}]},
                {"name":"eth0","ip-addresses":[
                    {"ip-address":"fe80::1","ip-address-type":"ipv6"},
                    {"ip-address":"192.168.1.50","ip-address-type":"ipv4"}]}
            ]}"#,
        )
        .unwrap();

        let interfaces = data.result.unwrap();
        assert_eq!(first_guest_ipv4(&interfaces).as_deref(), Some("192.168.1.50"));
    }
}
