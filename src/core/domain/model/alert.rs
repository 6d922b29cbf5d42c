//! Transition alerts produced by the diff engine.

use super::canonical_state::CanonicalState;
use super::job_record::JobRecord;
use super::memory_stats::MemoryStats;
use super::queue::QueueSummary;
use serde::{Deserialize, Serialize};

/// A node that just entered the free set, with best-effort enrichment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeAvailability {
    pub name: String,
    pub partition: String,
    pub raw_state: String,
    pub state: CanonicalState,
    pub cpu_total: u32,
    pub cpu_allocated: u32,
    pub memory: MemoryStats,
}

impl NodeAvailability {
    pub fn cpu_free(&self) -> u32 {
        self.cpu_total.saturating_sub(self.cpu_allocated)
    }
}

/// One edge-triggered event.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// The gateway stopped answering.
    ClusterOffline,
    /// The gateway answers again after an outage.
    ClusterRestored,
    /// All nodes that became available this cycle, as a single batch.
    NodesAvailable {
        nodes: Vec<NodeAvailability>,
        queue: QueueSummary,
    },
    /// A tracked job left the queue. `job` is the record seen on the previous cycle.
    JobFinished { job_id: String, job: JobRecord },
}

impl Alert {
    pub fn kind(&self) -> &'static str {
        match self {
            Alert::ClusterOffline => "cluster_offline",
            Alert::ClusterRestored => "cluster_restored",
            Alert::NodesAvailable { .. } => "nodes_available",
            Alert::JobFinished { .. } => "job_finished",
        }
    }
}
