//! Domain models for queue and node-detail queries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Queue occupancy grouped by submitting user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueSummary {
    pub total_jobs: u32,
    pub per_user: BTreeMap<String, u32>,
}

impl QueueSummary {
    /// Users sorted by job count (descending, then by name), truncated to `limit`.
    pub fn top_users(&self, limit: usize) -> Vec<(&str, u32)> {
        let mut users: Vec<(&str, u32)> = self
            .per_user
            .iter()
            .map(|(user, count)| (user.as_str(), *count))
            .collect();
        users.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        users.truncate(limit);
        users
    }
}

/// Keys kept from the control query; everything else is discarded.
const CONTROL_KEYS: [&str; 5] = ["RealMemory", "AllocMem", "CPUAlloc", "CPUTot", "CPULoad"];

/// Allow-listed `Key=Value` fields of one node from the control query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeControlFields(BTreeMap<String, String>);

/// Control-query fields per node name.
pub type ControlDetails = BTreeMap<String, NodeControlFields>;

impl NodeControlFields {
    /// Stores `value` if `key` is allow-listed. Returns whether it was kept.
    pub fn insert(&mut self, key: &str, value: &str) -> bool {
        if CONTROL_KEYS.contains(&key) {
            self.0.insert(key.to_string(), value.to_string());
            true
        } else {
            false
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    pub fn real_memory_mb(&self) -> Option<u64> {
        self.get_u64("RealMemory")
    }

    pub fn alloc_mem_mb(&self) -> Option<u64> {
        self.get_u64("AllocMem")
    }

    pub fn cpu_total(&self) -> Option<u32> {
        self.get("CPUTot")?.parse().ok()
    }

    pub fn cpu_alloc(&self) -> Option<u32> {
        self.get("CPUAlloc")?.parse().ok()
    }

    pub fn cpu_load(&self) -> Option<f64> {
        self.get("CPULoad")?.parse().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a node is currently doing, for on-demand inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeActivity {
    /// The first job running on the node.
    Running {
        user: String,
        job_name: String,
        elapsed: String,
    },
    /// The node's last busy timestamp as reported by the scheduler.
    IdleSince(String),
    Unknown,
}

impl std::fmt::Display for NodeActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeActivity::Running {
                user,
                job_name,
                elapsed,
            } => write!(f, "Running job '{}' by {} ({})", job_name, user, elapsed),
            NodeActivity::IdleSince(ts) => write!(f, "Idle since {}", ts),
            NodeActivity::Unknown => f.write_str("No details available."),
        }
    }
}
