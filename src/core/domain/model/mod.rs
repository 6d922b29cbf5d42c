mod alert;
mod canonical_state;
mod history;
mod job_record;
mod memory_stats;
mod node_record;
mod notification;
mod queue;
mod ssh_endpoint;

pub use alert::{Alert, NodeAvailability};
pub use canonical_state::CanonicalState;
pub use history::{HistoryPoint, NodeSnapshot, StateCounts};
pub use job_record::{JobRecord, JobSet};
pub use memory_stats::MemoryStats;
pub use node_record::{NodeInventory, NodeRecord};
pub use notification::Notification;
pub use queue::{ControlDetails, NodeActivity, NodeControlFields, QueueSummary};
pub use ssh_endpoint::SshEndpoint;
