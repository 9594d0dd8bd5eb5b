//! Published VM collection

use std::collections::HashSet;

use dashmap::DashMap;

use pd_core::VirtualMachine;

/// The VM collection published to the view layer.
///
/// Writers replace whole entries keyed by vmid; readers take snapshots.
/// A full refresh merges per id instead of swapping the map out, so a
/// reconciliation write racing the refresh lands on exactly its own
/// entry and neither update is lost.
#[derive(Debug, Default)]
pub struct VmStore {
    vms: DashMap<u32, VirtualMachine>,
}

impl VmStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            vms: DashMap::new(),
        }
    }

    /// Look up one guest by vmid
    pub fn get(&self, vmid: u32) -> Option<VirtualMachine> {
        self.vms.get(&vmid).map(|r| r.clone())
    }

    /// Replace (or insert) a single entry
    pub fn upsert(&self, vm: VirtualMachine) {
        self.vms.insert(vm.vmid, vm);
    }

    /// Merge a freshly fetched listing: upsert every entry and drop ids
    /// the cluster no longer reports
    pub fn replace_all(&self, vms: Vec<VirtualMachine>) {
        let keep: HashSet<u32> = vms.iter().map(|vm| vm.vmid).collect();
        for vm in vms {
            self.vms.insert(vm.vmid, vm);
        }
        self.vms.retain(|vmid, _| keep.contains(vmid));
    }

    /// Snapshot of the collection, sorted by vmid
    pub fn snapshot(&self) -> Vec<VirtualMachine> {
        let mut vms: Vec<VirtualMachine> = self.vms.iter().map(|r| r.value().clone()).collect();
        vms.sort_unstable_by_key(|vm| vm.vmid);
        vms
    }

    /// Number of published guests
    pub fn len(&self) -> usize {
        self.vms.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }
}
