//! Domain models for the persisted capacity history.

use super::canonical_state::CanonicalState;
use super::node_record::NodeInventory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of nodes in each canonical state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StateCounts {
    pub idle: u32,
    pub mixed: u32,
    pub allocated: u32,
    pub down: u32,
}

impl StateCounts {
    /// Counts every node of the inventory by canonical state.
    pub fn from_inventory(inventory: &NodeInventory) -> Self {
        inventory
            .values()
            .fold(Self::default(), |mut counts, record| {
                match record.canonical_state {
                    CanonicalState::Idle => counts.idle += 1,
                    CanonicalState::Mixed => counts.mixed += 1,
                    CanonicalState::Allocated => counts.allocated += 1,
                    CanonicalState::DownOrUnknown => counts.down += 1,
                }
                counts
            })
    }

    pub fn total(&self) -> u32 {
        self.idle + self.mixed + self.allocated + self.down
    }
}

/// One row of the aggregate history log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    /// Seconds since the UNIX epoch.
    pub timestamp: f64,
    pub counts: StateCounts,
}

impl HistoryPoint {
    pub const CSV_HEADER: &'static str = "Timestamp,Idle,Mixed,Alloc,Down";

    /// Renders the point as a CSV row without a trailing newline.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.timestamp,
            self.counts.idle,
            self.counts.mixed,
            self.counts.allocated,
            self.counts.down
        )
    }

    /// Parses a CSV row written by [`HistoryPoint::to_csv_row`].
    pub fn from_csv_row(row: &str) -> Option<Self> {
        let mut fields = row.trim().split(',');
        let timestamp = fields.next()?.parse::<f64>().ok()?;
        let idle = fields.next()?.parse().ok()?;
        let mixed = fields.next()?.parse().ok()?;
        let allocated = fields.next()?.parse().ok()?;
        let down = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            timestamp,
            counts: StateCounts {
                idle,
                mixed,
                allocated,
                down,
            },
        })
    }
}

/// Per-node state codes at one instant, used for dense reconstruction.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeSnapshot {
    pub timestamp: f64,
    /// Node name to [`CanonicalState::code`].
    pub nodes: BTreeMap<String, u8>,
}

impl NodeSnapshot {
    pub fn from_inventory(timestamp: f64, inventory: &NodeInventory) -> Self {
        Self {
            timestamp,
            nodes: inventory
                .iter()
                .map(|(name, record)| (name.clone(), record.canonical_state.code()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::model::node_record::NodeRecord;

    fn inventory() -> NodeInventory {
        [
            NodeRecord::new("huk01", "alto", "idle", 48, 128000),
            NodeRecord::new("huk02", "alto", "mixed", 48, 128000),
            NodeRecord::new("huk03", "medio", "allocated", 32, 64000),
            NodeRecord::new("huk04", "medio", "down*", 32, 64000),
            NodeRecord::new("huk05", "medio", "idle*", 32, 64000),
        ]
        .into_iter()
        .map(|record| (record.name.clone(), record))
        .collect()
    }

    #[test]
    fn test_counts_from_inventory() {
        let counts = StateCounts::from_inventory(&inventory());
        assert_eq!(
            counts,
            StateCounts {
                idle: 2,
                mixed: 1,
                allocated: 1,
                down: 1
            }
        );
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn test_csv_row_format() {
        let point = HistoryPoint {
            timestamp: 1700000000.5,
            counts: StateCounts {
                idle: 2,
                mixed: 1,
                allocated: 3,
                down: 0,
            },
        };
        assert_eq!(point.to_csv_row(), "1700000000.5,2,1,3,0");
        assert_eq!(HistoryPoint::from_csv_row("1700000000.5,2,1,3,0\n"), Some(point));
    }

    #[test]
    fn test_csv_row_rejects_partial_rows() {
        assert_eq!(HistoryPoint::from_csv_row("1700000000.5,2,1"), None);
        assert_eq!(HistoryPoint::from_csv_row(HistoryPoint::CSV_HEADER), None);
        assert_eq!(HistoryPoint::from_csv_row("1,2,3,4,5,6"), None);
    }

    #[test]
    fn test_snapshot_serializes_with_codes() {
        let snapshot = NodeSnapshot::from_inventory(10.0, &inventory());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["timestamp"], 10.0);
        assert_eq!(json["nodes"]["huk01"], 0);
        assert_eq!(json["nodes"]["huk02"], 1);
        assert_eq!(json["nodes"]["huk03"], 2);
        assert_eq!(json["nodes"]["huk04"], 3);
    }
}
