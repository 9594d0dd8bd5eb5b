//! Per-guest in-flight operation registry

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use pd_core::OperationKind;

/// Tracks guests whose command has been accepted by the cluster but not
/// yet confirmed terminal by the coordinator.
///
/// The hypervisor serializes state changes per guest, so at most one
/// operation may be pending per vmid. Claiming is an atomic map-entry
/// insert; only one of two racing claims for the same vmid wins.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    pending: DashMap<u32, OperationKind>,
}

impl InFlightRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Claim the in-flight slot for a guest.
    ///
    /// Returns the kind already pending when the slot is taken.
    pub fn claim(&self, vmid: u32, kind: OperationKind) -> Result<(), OperationKind> {
        match self.pending.entry(vmid) {
            Entry::Occupied(entry) => Err(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(kind);
                Ok(())
            }
        }
    }

    /// Release the slot. Idempotent; clearing an absent vmid is a no-op.
    pub fn clear(&self, vmid: u32) {
        self.pending.remove(&vmid);
    }

    /// The operation currently pending for a guest, if any
    pub fn pending_kind(&self, vmid: u32) -> Option<OperationKind> {
        self.pending.get(&vmid).map(|r| *r)
    }

    /// Whether any operation is pending for this guest
    pub fn contains(&self, vmid: u32) -> bool {
        self.pending.contains_key(&vmid)
    }

    /// Guests with a pending operation of the given kind, sorted.
    /// This is the per-kind badge set the view layer renders.
    pub fn ids_for(&self, kind: OperationKind) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .pending
            .iter()
            .filter(|r| *r.value() == kind)
            .map(|r| *r.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of pending operations
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
