//! Domain model for compute nodes as reported by the node inventory query.
//!
//! A fresh [`NodeInventory`] is produced every poll cycle; records are never
//! mutated after construction.

use super::canonical_state::CanonicalState;
use super::queue::NodeControlFields;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of node name to its record for one poll cycle.
pub type NodeInventory = BTreeMap<String, NodeRecord>;

/// A node in the Slurm cluster.
///
/// The inventory query carries no allocation figures, so `cpu_allocated` and
/// `memory_allocated_mb` stay at the `0` sentinel until
/// [`NodeRecord::with_allocation`] fills them from control-query fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeRecord {
    /// The node name (e.g., "huk01").
    pub name: String,
    /// Partition without the default-partition marker (e.g., "alto").
    pub partition: String,
    /// State text exactly as reported (e.g., "idle*", "mixed").
    pub raw_state: String,
    /// Normalized state derived from `raw_state`.
    pub canonical_state: CanonicalState,
    /// Configured CPU count.
    pub cpu_total: u32,
    /// Allocated CPUs (`CPUAlloc`, 0 when unknown).
    pub cpu_allocated: u32,
    /// Configured memory in MB.
    pub memory_total_mb: u64,
    /// Allocated memory in MB (`AllocMem`, 0 when unknown).
    pub memory_allocated_mb: u64,
}

impl NodeRecord {
    /// Builds a record from inventory columns; the canonical state is derived
    /// from `raw_state` so the two can never disagree.
    pub fn new(
        name: impl Into<String>,
        partition: impl Into<String>,
        raw_state: impl Into<String>,
        cpu_total: u32,
        memory_total_mb: u64,
    ) -> Self {
        let raw_state = raw_state.into();
        Self {
            name: name.into(),
            partition: partition.into(),
            canonical_state: CanonicalState::classify(&raw_state),
            raw_state,
            cpu_total,
            cpu_allocated: 0,
            memory_total_mb,
            memory_allocated_mb: 0,
        }
    }

    /// Takes the allocation figures from the node's control-query fields.
    /// Absent or unparsable fields leave the current value in place.
    pub fn with_allocation(mut self, control: &NodeControlFields) -> Self {
        if let Some(cpus) = control.cpu_alloc() {
            self.cpu_allocated = cpus;
        }
        if let Some(mb) = control.alloc_mem_mb() {
            self.memory_allocated_mb = mb;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_canonical_state() {
        let record = NodeRecord::new("huk01", "alto", "idle*", 48, 128000);
        assert_eq!(record.canonical_state, CanonicalState::Idle);
        assert_eq!(record.raw_state, "idle*");
        assert_eq!(record.cpu_allocated, 0);
        assert_eq!(record.memory_allocated_mb, 0);
    }

    #[test]
    fn test_with_allocation_reads_control_fields() {
        let mut control = NodeControlFields::default();
        control.insert("CPUAlloc", "12");
        control.insert("AllocMem", "32000");
        let record = NodeRecord::new("huk01", "alto", "mixed", 48, 128000).with_allocation(&control);
        assert_eq!(record.cpu_allocated, 12);
        assert_eq!(record.memory_allocated_mb, 32000);

        let mut partial = NodeControlFields::default();
        partial.insert("AllocMem", "n/a");
        let record = record.with_allocation(&partial);
        assert_eq!((record.cpu_allocated, record.memory_allocated_mb), (12, 32000));
    }
}
