//! Domain model for the tracked user's queued jobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Jobs visible in the queue, keyed by job id.
pub type JobSet = BTreeMap<String, JobRecord>;

/// A job as listed by the queue query. The id is the map key.
///
/// The serialized shape (`name`, `state`, `node`) is also the on-disk format
/// of the persisted job set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobRecord {
    pub name: String,
    #[serde(rename = "state")]
    pub raw_state: String,
    pub node: String,
}

impl JobRecord {
    pub fn new(
        name: impl Into<String>,
        raw_state: impl Into<String>,
        node: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            raw_state: raw_state.into(),
            node: node.into(),
        }
    }
}
