//! Live memory figures for a compute node.

use serde::{Deserialize, Serialize};

const MB_PER_GB: f64 = 1024.0;

/// Memory usage of a node in GB.
///
/// A zero `total_gb` is the "unavailable" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct MemoryStats {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
}

impl MemoryStats {
    /// Builds stats from megabyte figures.
    pub fn from_mb(total_mb: u64, used_mb: u64, free_mb: u64) -> Self {
        Self {
            total_gb: total_mb as f64 / MB_PER_GB,
            used_gb: used_mb as f64 / MB_PER_GB,
            free_gb: free_mb as f64 / MB_PER_GB,
        }
    }

    /// Returns true when no figures were obtained.
    pub fn is_unavailable(&self) -> bool {
        self.total_gb == 0.0
    }
}
