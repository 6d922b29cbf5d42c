//! Read-only scheduler queries over the tunnel.

use crate::{
    cluster::application::parser,
    core::{
        domain::{
            error::WatchResult,
            model::{
                CanonicalState, ControlDetails, JobSet, MemoryStats, NodeActivity, NodeInventory,
                QueueSummary,
            },
            value_object::RemoteToken,
        },
        infrastructure::{
            session_manager::SessionManager,
            transport::{RemoteOutput, TunnelTransport},
        },
    },
};
use async_trait::async_trait;
use std::time::Duration;

/// Timeout for commands that hop from the head node to a compute node.
pub const COMPUTE_HOP_TIMEOUT: Duration = Duration::from_secs(10);

const INVENTORY_COMMAND: &str = r#"sinfo -o "%P %n %T %c %m""#;
const QUEUE_USERS_COMMAND: &str = "squeue -h -o %u";

/// What the alert engine needs from the cluster.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Cheap reachability check. Never fails.
    async fn heartbeat(&self) -> bool;

    /// Current node inventory. An empty map means "no data".
    async fn list_nodes(&self) -> WatchResult<NodeInventory>;

    /// Live memory of one node; zeros when unavailable. Never fails.
    async fn direct_memory(&self, node: &str) -> MemoryStats;

    /// Allow-listed control-query fields for the given nodes.
    async fn control_fallback(&self, nodes: &[String]) -> WatchResult<ControlDetails>;

    /// Queue occupancy by user.
    async fn queue_summary(&self) -> WatchResult<QueueSummary>;

    /// Jobs of `user`; empty when the user has none or the query fails. Never fails.
    async fn user_jobs(&self, user: &str) -> JobSet;
}

/// [`ClusterSource`] backed by real sessions. Every operation opens and
/// closes its own session.
pub struct ClusterQueryService<T: TunnelTransport> {
    sessions: SessionManager<T>,
    node_prefix: Option<String>,
}

impl<T: TunnelTransport> ClusterQueryService<T> {
    pub fn new(sessions: SessionManager<T>) -> Self {
        Self {
            sessions,
            node_prefix: None,
        }
    }

    /// Prefix used by [`ClusterQueryService::resolve_node_name`] (e.g. `huk`).
    pub fn with_node_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.node_prefix = Some(prefix.into());
        self
    }

    async fn run(&self, command: &str, timeout: Option<Duration>) -> WatchResult<RemoteOutput> {
        let session = self.sessions.acquire().await?;
        let result = session.exec(command, timeout).await;
        session.close().await;
        result
    }

    /// Expands an all-digit short name with the configured prefix
    /// (`120` becomes `huk120`); anything else is returned unchanged.
    pub fn resolve_node_name(&self, short: &str) -> String {
        match &self.node_prefix {
            Some(prefix) if !short.is_empty() && short.chars().all(|c| c.is_ascii_digit()) => {
                format!("{}{}", prefix, short)
            }
            _ => short.to_string(),
        }
    }

    /// What `node` is doing: its first job when busy, or when it was last busy.
    #[tracing::instrument(skip(self))]
    pub async fn node_activity(&self, node: &str, state: CanonicalState) -> NodeActivity {
        let Ok(token) = RemoteToken::new(node) else {
            tracing::warn!(node, "refusing to query invalid node name");
            return NodeActivity::Unknown;
        };
        let busy = matches!(state, CanonicalState::Allocated | CanonicalState::Mixed);
        let command = if busy {
            format!(r#"squeue -w {} -h -o "%u %j %M""#, token)
        } else {
            format!("scontrol show node {} | grep LastBusyTime", token)
        };
        let activity = match self.run(&command, None).await {
            Ok(output) if output.exit_ok => {
                if busy {
                    parser::parse_node_jobs(&output.stdout)
                } else {
                    parser::parse_last_busy(&output.stdout)
                }
            }
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(error = %error, "node activity query failed");
                None
            }
        };
        activity.unwrap_or(NodeActivity::Unknown)
    }
}

#[async_trait]
impl<T: TunnelTransport> ClusterSource for ClusterQueryService<T> {
    async fn heartbeat(&self) -> bool {
        self.sessions.heartbeat().await
    }

    #[tracing::instrument(skip(self))]
    async fn list_nodes(&self) -> WatchResult<NodeInventory> {
        let output = self.run(INVENTORY_COMMAND, None).await?;
        if !output.exit_ok {
            tracing::warn!("inventory query exited with an error");
            return Ok(NodeInventory::new());
        }
        Ok(parser::parse_inventory(&output.stdout))
    }

    #[tracing::instrument(skip(self))]
    async fn direct_memory(&self, node: &str) -> MemoryStats {
        let Ok(token) = RemoteToken::new(node) else {
            tracing::warn!("refusing to query invalid node name");
            return MemoryStats::default();
        };
        let command = format!(
            r#"ssh {} "free -m | grep Mem | awk '{{print \$2, \$3, \$4}}'""#,
            token
        );
        match self.run(&command, Some(COMPUTE_HOP_TIMEOUT)).await {
            Ok(output) if output.exit_ok => {
                parser::parse_free_memory(&output.stdout).unwrap_or_else(|| {
                    tracing::debug!(stdout = %output.stdout.trim(), "unexpected memory output");
                    MemoryStats::default()
                })
            }
            Ok(_) => MemoryStats::default(),
            Err(error) => {
                tracing::warn!(error = %error, "direct memory query failed");
                MemoryStats::default()
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn control_fallback(&self, nodes: &[String]) -> WatchResult<ControlDetails> {
        let mut tokens = Vec::with_capacity(nodes.len());
        for node in nodes {
            match RemoteToken::new(node.as_str()) {
                Ok(token) => tokens.push(token.as_str().to_string()),
                Err(_) => tracing::warn!(node = %node, "skipping invalid node name"),
            }
        }
        if tokens.is_empty() {
            return Ok(ControlDetails::new());
        }
        let command = format!("scontrol show node {} --future", tokens.join(","));
        let output = self.run(&command, None).await?;
        if !output.exit_ok {
            return Ok(ControlDetails::new());
        }
        Ok(parser::parse_control(&output.stdout))
    }

    #[tracing::instrument(skip(self))]
    async fn queue_summary(&self) -> WatchResult<QueueSummary> {
        let output = self.run(QUEUE_USERS_COMMAND, None).await?;
        if !output.exit_ok {
            return Ok(QueueSummary::default());
        }
        Ok(parser::parse_queue_users(&output.stdout))
    }

    #[tracing::instrument(skip(self))]
    async fn user_jobs(&self, user: &str) -> JobSet {
        let Ok(token) = RemoteToken::new(user) else {
            tracing::warn!("refusing to query invalid user name");
            return JobSet::new();
        };
        let command = format!(r#"squeue -u {} -h -o "%i %j %T %N""#, token);
        match self.run(&command, None).await {
            Ok(output) if output.exit_ok => parser::parse_user_jobs(&output.stdout),
            Ok(_) => JobSet::new(),
            Err(error) => {
                tracing::debug!(error = %error, "user job query failed");
                JobSet::new()
            }
        }
    }
}
