//! The stateful diff engine behind every alert.
//!
//! Three domains are compared against the previous cycle: connectivity, the
//! set of free nodes and the tracked user's jobs. Only the job set outlives the
//! process; the rest starts fresh on every launch.

use crate::{
    cluster::application::service::{enrichment, query_service::ClusterSource},
    core::{
        domain::model::{
            Alert, ControlDetails, HistoryPoint, JobRecord, JobSet, NodeInventory, NodeSnapshot,
            QueueSummary, StateCounts,
        },
        infrastructure::{history_store::HistoryStore, job_store::JobStore},
    },
};
use chrono::Utc;
use std::collections::BTreeSet;

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub alerts: Vec<Alert>,
    pub online: bool,
    pub nodes_seen: usize,
}

/// Names of nodes whose canonical state counts as available.
pub fn free_set(inventory: &NodeInventory) -> BTreeSet<String> {
    inventory
        .values()
        .filter(|record| record.canonical_state.is_available())
        .map(|record| record.name.clone())
        .collect()
}

/// `current - previous`, sorted.
pub fn newly_free(current: &BTreeSet<String>, previous: &BTreeSet<String>) -> Vec<String> {
    current.difference(previous).cloned().collect()
}

/// Jobs present in `previous` but gone from `current`, with their previous records.
pub fn completed_jobs(previous: &JobSet, current: &JobSet) -> Vec<(String, JobRecord)> {
    previous
        .iter()
        .filter(|(id, _)| !current.contains_key(*id))
        .map(|(id, job)| (id.clone(), job.clone()))
        .collect()
}

/// Owner of all between-cycle state. Constructed once, optionally hydrated
/// from the job store, then driven by the poll loop.
pub struct AlertEngine {
    previous_free: BTreeSet<String>,
    previous_online: bool,
    previous_jobs: JobSet,
    tracked_user: Option<String>,
    history: HistoryStore,
    job_store: JobStore,
}

impl AlertEngine {
    pub fn new(history: HistoryStore, job_store: JobStore, tracked_user: Option<String>) -> Self {
        Self {
            previous_free: BTreeSet::new(),
            previous_online: true,
            previous_jobs: JobSet::new(),
            tracked_user,
            history,
            job_store,
        }
    }

    /// Loads the persisted job set. An unreadable file is logged and treated as empty.
    pub async fn hydrate(&mut self) {
        match self.job_store.load().await {
            Ok(jobs) => {
                tracing::info!(jobs = jobs.len(), "restored tracked jobs");
                self.previous_jobs = jobs;
            }
            Err(error) => {
                tracing::warn!(error = %error, path = %self.job_store.path().display(), "ignoring unreadable job state");
                self.previous_jobs = JobSet::new();
            }
        }
    }

    pub fn previous_free(&self) -> &BTreeSet<String> {
        &self.previous_free
    }

    pub fn is_online(&self) -> bool {
        self.previous_online
    }

    pub fn tracked_jobs(&self) -> &JobSet {
        &self.previous_jobs
    }

    pub fn tracked_user(&self) -> Option<&str> {
        self.tracked_user.as_deref()
    }

    /// Runs one cycle: connectivity gate, node diff, job diff.
    ///
    /// A failing domain is logged and does not stop the domains after it.
    pub async fn run_cycle<S: ClusterSource + ?Sized>(&mut self, source: &S) -> CycleReport {
        let mut alerts = Vec::new();

        let reachable = source.heartbeat().await;
        alerts.extend(self.connectivity_transition(reachable));
        if !reachable {
            return CycleReport {
                alerts,
                online: false,
                nodes_seen: 0,
            };
        }

        let nodes_seen = match source.list_nodes().await {
            Ok(inventory) => {
                alerts.extend(self.diff_nodes(source, &inventory).await);
                inventory.len()
            }
            Err(error) => {
                tracing::warn!(error = %error, "node inventory unavailable this cycle");
                0
            }
        };

        if let Some(user) = self.tracked_user.clone() {
            alerts.extend(self.diff_jobs(source, &user).await);
        }

        CycleReport {
            alerts,
            online: true,
            nodes_seen,
        }
    }

    fn connectivity_transition(&mut self, reachable: bool) -> Option<Alert> {
        match (self.previous_online, reachable) {
            (true, false) => {
                tracing::warn!("cluster went offline");
                self.previous_online = false;
                Some(Alert::ClusterOffline)
            }
            (false, true) => {
                tracing::info!("cluster back online");
                self.previous_online = true;
                Some(Alert::ClusterRestored)
            }
            _ => None,
        }
    }

    async fn diff_nodes<S: ClusterSource + ?Sized>(
        &mut self,
        source: &S,
        inventory: &NodeInventory,
    ) -> Option<Alert> {
        if inventory.is_empty() {
            tracing::debug!("empty node inventory; skipping availability diff");
            return None;
        }
        self.record_history(inventory).await;

        let current = free_set(inventory);
        let newly = newly_free(&current, &self.previous_free);
        self.previous_free = current;
        if newly.is_empty() {
            return None;
        }
        tracing::info!(nodes = ?newly, "nodes became available");

        let control = source.control_fallback(&newly).await.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "control query failed; enriching without it");
            ControlDetails::new()
        });
        let mut nodes = Vec::with_capacity(newly.len());
        for name in &newly {
            let Some(record) = inventory.get(name) else {
                continue;
            };
            let direct = source.direct_memory(name).await;
            nodes.push(enrichment::enrich(record, direct, control.get(name)));
        }
        let queue = source.queue_summary().await.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "queue summary failed");
            QueueSummary::default()
        });
        Some(Alert::NodesAvailable { nodes, queue })
    }

    async fn record_history(&self, inventory: &NodeInventory) {
        let timestamp = Utc::now().timestamp_millis() as f64 / 1000.0;
        let point = HistoryPoint {
            timestamp,
            counts: StateCounts::from_inventory(inventory),
        };
        if let Err(error) = self.history.append_counts(&point).await {
            tracing::error!(error = %error, "failed to append history point");
        }
        let snapshot = NodeSnapshot::from_inventory(timestamp, inventory);
        if let Err(error) = self.history.append_snapshot(&snapshot).await {
            tracing::error!(error = %error, "failed to append node snapshot");
        }
    }

    async fn diff_jobs<S: ClusterSource + ?Sized>(&mut self, source: &S, user: &str) -> Vec<Alert> {
        let current = source.user_jobs(user).await;
        let alerts: Vec<Alert> = completed_jobs(&self.previous_jobs, &current)
            .into_iter()
            .map(|(job_id, job)| {
                tracing::info!(job_id = %job_id, name = %job.name, "tracked job finished");
                Alert::JobFinished { job_id, job }
            })
            .collect();
        self.previous_jobs = current;
        if let Err(error) = self.job_store.save(&self.previous_jobs).await {
            tracing::error!(error = %error, "failed to persist tracked jobs");
        }
        alerts
    }
}
