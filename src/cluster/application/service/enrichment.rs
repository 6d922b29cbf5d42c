//! Best-effort enrichment of newly available nodes.
//!
//! Each source is a step returning `Option`; the first step that yields a
//! value wins and the zero sentinel is the last resort.

use crate::core::domain::model::{MemoryStats, NodeAvailability, NodeControlFields, NodeRecord};

const MB_PER_GB: f64 = 1024.0;

/// The live OS figures, if the direct query produced any.
pub fn memory_from_direct(direct: MemoryStats) -> Option<MemoryStats> {
    (!direct.is_unavailable()).then_some(direct)
}

/// Memory derived from the scheduler's `RealMemory`/`AllocMem` (MB).
pub fn memory_from_control(fields: &NodeControlFields) -> Option<MemoryStats> {
    let real = fields.real_memory_mb()? as f64;
    let allocated = fields.alloc_mem_mb().unwrap_or(0) as f64;
    Some(MemoryStats {
        total_gb: real / MB_PER_GB,
        used_gb: allocated / MB_PER_GB,
        free_gb: (real - allocated) / MB_PER_GB,
    })
}

/// Direct figures first, then the control query, then zeros.
pub fn resolve_memory(direct: MemoryStats, control: Option<&NodeControlFields>) -> MemoryStats {
    memory_from_direct(direct)
        .or_else(|| control.and_then(memory_from_control))
        .unwrap_or_default()
}

/// `(total, allocated)` CPUs: the control query's `CPUTot` over the
/// inventory count, and its `CPUAlloc` or zero.
pub fn resolve_cpus(record: &NodeRecord, control: Option<&NodeControlFields>) -> (u32, u32) {
    let total = control
        .and_then(NodeControlFields::cpu_total)
        .unwrap_or(record.cpu_total);
    let allocated = control.and_then(NodeControlFields::cpu_alloc).unwrap_or(0);
    (total, allocated)
}

pub fn enrich(
    record: &NodeRecord,
    direct: MemoryStats,
    control: Option<&NodeControlFields>,
) -> NodeAvailability {
    let (cpu_total, cpu_allocated) = resolve_cpus(record, control);
    NodeAvailability {
        name: record.name.clone(),
        partition: record.partition.clone(),
        raw_state: record.raw_state.clone(),
        state: record.canonical_state,
        cpu_total,
        cpu_allocated,
        memory: resolve_memory(direct, control),
    }
}
