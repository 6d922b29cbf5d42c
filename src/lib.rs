mod auth;
pub mod cluster;
pub mod config;
mod core;
pub mod logging;
pub mod monitor;
pub mod shutdown;

#[cfg(test)]
mod tests;

pub use crate::core::domain::error::{ValidationError, WatchError, WatchResult};
pub use crate::core::domain::model::{
    Alert, CanonicalState, ControlDetails, HistoryPoint, JobRecord, JobSet, MemoryStats,
    NodeActivity, NodeAvailability, NodeControlFields, NodeInventory, NodeRecord, NodeSnapshot,
    Notification, QueueSummary, SshEndpoint, StateCounts,
};
pub use crate::core::domain::value_object::{
    RemoteToken, SshHost, SshPassword, SshPort, SshUsername, WebhookUrl,
};
pub use crate::core::infrastructure::{
    history_store::HistoryStore,
    job_store::JobStore,
    session_manager::{RetryPolicy, Session, SessionManager},
    ssh_transport::SshTransport,
    transport::{RemoteOutput, TunnelTransport},
    webhook_notifier::WebhookNotifier,
};

use crate::{
    cluster::application::service::query_service::{ClusterQueryService, ClusterSource},
    core::domain::value_object::{
        validate_host, validate_password, validate_port, validate_username, validate_webhook_url,
    },
    monitor::application::service::{
        alert_engine::AlertEngine,
        dispatcher::{Dispatcher, LogNotifier, Notifier, PlainSummarizer},
        poll_loop::PollLoop,
    },
};
use chrono::FixedOffset;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_DATA_DIR: &str = "data";
const MAX_UTC_OFFSET_HOURS: u32 = 14;

/// A watcher for a Slurm cluster reached through a bastion host.
///
/// `SlurmWatch` ties together the tunneled session manager, the scheduler
/// queries, the alert engine with its on-disk state, and notification delivery.
///
/// # Examples
///
/// ```no_run
/// use slurm_watch::{SlurmWatch, WatchResult};
///
/// #[tokio::main]
/// async fn main() -> WatchResult<()> {
///     let watch = SlurmWatch::builder()
///         .gateway("bastion.example.org", 7722)
///         .gateway_credentials("carlos", "bastion-password")
///         .target("192.168.16.100", 22)
///         .target_credentials("carlos", "head-node-password")
///         .tracked_user("carlos")
///         .build()?;
///
///     let nodes = watch.status().await?;
///     println!("{} nodes", nodes.len());
///     Ok(())
/// }
/// ```
pub struct SlurmWatch<T: TunnelTransport = SshTransport> {
    query: ClusterQueryService<T>,
    settings: WatchSettings,
}

/// Validated non-connection settings.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub check_interval: Duration,
    pub tracked_user: Option<String>,
    pub mention: Option<String>,
    pub webhook_url: Option<WebhookUrl>,
    pub webhook_per_minute: Option<NonZeroU32>,
    pub utc_offset: FixedOffset,
    pub data_dir: PathBuf,
}

/// Everything known about one node, for on-demand inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInspection {
    pub name: String,
    pub record: Option<NodeRecord>,
    pub control: Option<NodeControlFields>,
    pub memory: MemoryStats,
    pub activity: NodeActivity,
}

/// Builder for SlurmWatch configuration
#[derive(Debug, Default, Clone)]
pub struct SlurmWatchBuilder {
    gateway_host: Option<String>,
    gateway_port: Option<u16>,
    gateway_username: Option<String>,
    gateway_password: Option<String>,
    target_host: Option<String>,
    target_port: Option<u16>,
    target_username: Option<String>,
    target_password: Option<String>,
    check_interval: Option<Duration>,
    tracked_user: Option<String>,
    mention: Option<String>,
    webhook_url: Option<String>,
    webhook_per_minute: Option<u32>,
    utc_offset_hours: Option<i32>,
    data_dir: Option<PathBuf>,
    node_prefix: Option<String>,
}

fn required(value: Option<String>, field: &str) -> WatchResult<String> {
    value.ok_or_else(|| {
        WatchError::Validation(ValidationError::Field {
            field: field.to_string(),
            message: format!("{} is required", field),
        })
    })
}

fn endpoint(
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    hop: &str,
) -> WatchResult<SshEndpoint> {
    let host = required(host, &format!("{}_host", hop))?;
    validate_host(&host)?;
    let port = port.unwrap_or(SshPort::default().get());
    validate_port(port)?;
    let username = required(username, &format!("{}_username", hop))?;
    validate_username(&username)?;
    let password = required(password, &format!("{}_password", hop))?;
    validate_password(&password)?;
    Ok(SshEndpoint::new(
        SshHost::new_unchecked(host),
        SshPort::new_unchecked(port),
        SshUsername::new_unchecked(username),
        SshPassword::new_unchecked(password),
    ))
}

impl SlurmWatchBuilder {
    /// The intermediary host (hop 1).
    pub fn gateway(mut self, host: impl Into<String>, port: u16) -> Self {
        self.gateway_host = Some(host.into());
        self.gateway_port = Some(port);
        self
    }

    pub fn gateway_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.gateway_username = Some(username.into());
        self.gateway_password = Some(password.into());
        self
    }

    /// The scheduler head node (hop 2), as seen from the gateway.
    pub fn target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.target_host = Some(host.into());
        self.target_port = Some(port);
        self
    }

    pub fn target_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.target_username = Some(username.into());
        self.target_password = Some(password.into());
        self
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Cluster user whose jobs are tracked for completion alerts.
    pub fn tracked_user(mut self, user: impl Into<String>) -> Self {
        self.tracked_user = Some(user.into());
        self
    }

    /// Chat mention prepended to job-completion messages.
    pub fn mention(mut self, mention: impl Into<String>) -> Self {
        self.mention = Some(mention.into());
        self
    }

    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn webhook_per_minute(mut self, per_minute: u32) -> Self {
        self.webhook_per_minute = Some(per_minute);
        self
    }

    pub fn utc_offset_hours(mut self, hours: i32) -> Self {
        self.utc_offset_hours = Some(hours);
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Prefix for expanding numeric node names (`huk` turns `120` into `huk120`).
    pub fn node_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.node_prefix = Some(prefix.into());
        self
    }

    /// Validates the configuration and builds a watcher over SSH.
    ///
    /// # Errors
    /// Returns `WatchError::Validation` describing the first invalid field.
    pub fn build(self) -> WatchResult<SlurmWatch> {
        self.build_with_transport(SshTransport::new)
    }

    /// Like [`SlurmWatchBuilder::build`], with the transport created by `make_transport`
    /// from the validated gateway and target endpoints.
    pub fn build_with_transport<T, F>(self, make_transport: F) -> WatchResult<SlurmWatch<T>>
    where
        T: TunnelTransport,
        F: FnOnce(SshEndpoint, SshEndpoint) -> T,
    {
        let gateway = endpoint(
            self.gateway_host,
            self.gateway_port,
            self.gateway_username,
            self.gateway_password,
            "gateway",
        )?;
        let target = endpoint(
            self.target_host,
            self.target_port,
            self.target_username,
            self.target_password,
            "target",
        )?;

        let check_interval = self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL);
        if check_interval < Duration::from_secs(1) {
            return Err(ValidationError::ConstraintViolation(
                "Check interval must be at least one second".to_string(),
            )
            .into());
        }

        let hours = self.utc_offset_hours.unwrap_or(0);
        let utc_offset = (hours.unsigned_abs() <= MAX_UTC_OFFSET_HOURS)
            .then(|| FixedOffset::east_opt(hours * 3600))
            .flatten()
            .ok_or_else(|| ValidationError::Field {
                field: "utc_offset_hours".to_string(),
                message: format!("Offset must be within ±{} hours", MAX_UTC_OFFSET_HOURS),
            })?;

        if let Some(user) = &self.tracked_user {
            RemoteToken::new(user.as_str())?;
        }
        if let Some(prefix) = &self.node_prefix {
            RemoteToken::new(prefix.as_str())?;
        }

        let webhook_url = self
            .webhook_url
            .as_deref()
            .map(validate_webhook_url)
            .transpose()?
            .map(WebhookUrl::new_unchecked);
        let webhook_per_minute = match self.webhook_per_minute {
            Some(n) => Some(NonZeroU32::new(n).ok_or_else(|| {
                ValidationError::ConstraintViolation(
                    "Webhook rate limit must be greater than zero".to_string(),
                )
            })?),
            None => None,
        };

        let sessions = SessionManager::new(make_transport(gateway, target));
        let mut query = ClusterQueryService::new(sessions);
        if let Some(prefix) = self.node_prefix {
            query = query.with_node_prefix(prefix);
        }

        Ok(SlurmWatch {
            query,
            settings: WatchSettings {
                check_interval,
                tracked_user: self.tracked_user,
                mention: self.mention,
                webhook_url,
                webhook_per_minute,
                utc_offset,
                data_dir: self
                    .data_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            },
        })
    }
}

impl SlurmWatch {
    /// Creates a new builder for SlurmWatch configuration
    pub fn builder() -> SlurmWatchBuilder {
        SlurmWatchBuilder::default()
    }
}

impl<T: TunnelTransport> SlurmWatch<T> {
    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    pub fn query(&self) -> &ClusterQueryService<T> {
        &self.query
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(&self.settings.data_dir)
    }

    pub fn job_store(&self) -> JobStore {
        JobStore::new(&self.settings.data_dir)
    }

    /// A fresh alert engine hydrated from the persisted job set.
    pub async fn engine(&self) -> AlertEngine {
        let mut engine = AlertEngine::new(
            self.history_store(),
            self.job_store(),
            self.settings.tracked_user.clone(),
        );
        engine.hydrate().await;
        engine
    }

    /// The dispatcher for this configuration: webhook delivery when a URL is
    /// set, the log otherwise.
    ///
    /// # Errors
    /// Returns `WatchError::Notification` if the webhook client cannot be built.
    pub fn dispatcher(&self) -> WatchResult<Dispatcher> {
        let notifier: Box<dyn Notifier> = match &self.settings.webhook_url {
            Some(url) => Box::new(WebhookNotifier::new(
                url.clone(),
                self.settings.webhook_per_minute,
            )?),
            None => Box::new(LogNotifier),
        };
        let mut dispatcher = Dispatcher::new(notifier)
            .with_summarizer(Box::new(PlainSummarizer))
            .with_utc_offset(self.settings.utc_offset);
        if let Some(mention) = &self.settings.mention {
            dispatcher = dispatcher.with_mention(mention.clone());
        }
        Ok(dispatcher)
    }

    /// Consumes the watcher into a ready-to-run poll loop.
    pub async fn into_poll_loop(self) -> WatchResult<PollLoop<ClusterQueryService<T>>> {
        let engine = self.engine().await;
        let dispatcher = self.dispatcher()?;
        let interval = self.settings.check_interval;
        Ok(PollLoop::new(self.query, engine, dispatcher, interval))
    }

    /// Whether the gateway currently accepts a login.
    pub async fn heartbeat(&self) -> bool {
        self.query.heartbeat().await
    }

    /// The current node inventory.
    pub async fn status(&self) -> WatchResult<NodeInventory> {
        self.query.list_nodes().await
    }

    /// The current queue occupancy.
    pub async fn queue(&self) -> WatchResult<QueueSummary> {
        self.query.queue_summary().await
    }

    /// Inventory record, control fields, live memory and activity of one node.
    /// Numeric names are expanded with the configured prefix.
    pub async fn inspect(&self, node: &str) -> WatchResult<NodeInspection> {
        let name = self.query.resolve_node_name(node);
        RemoteToken::new(name.as_str())?;

        let control = self
            .query
            .control_fallback(std::slice::from_ref(&name))
            .await?
            .remove(&name)
            .filter(|fields| !fields.is_empty());
        let record = self
            .query
            .list_nodes()
            .await?
            .remove(&name)
            .map(|record| match &control {
                Some(fields) => record.with_allocation(fields),
                None => record,
            });
        let memory = self.query.direct_memory(&name).await;
        let state = record
            .as_ref()
            .map(|r| r.canonical_state)
            .unwrap_or(CanonicalState::DownOrUnknown);
        let activity = self.query.node_activity(&name, state).await;

        Ok(NodeInspection {
            name,
            record,
            control,
            memory,
            activity,
        })
    }

    /// Aggregate history points from the last `days` days, oldest first.
    pub async fn history(&self, days: u32) -> WatchResult<Vec<HistoryPoint>> {
        let since = chrono::Utc::now() - chrono::Duration::days(i64::from(days));
        let since = since.timestamp_millis() as f64 / 1000.0;
        self.history_store().read_counts_since(since).await
    }
}
