//! Rendering and delivery of alerts.
//!
//! Delivery problems are logged here and never reach the poll loop.

use crate::core::domain::{
    error::WatchResult,
    model::{Alert, JobRecord, NodeAvailability, Notification, QueueSummary},
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Used when no summarizer is configured or the configured one fails.
pub const FALLBACK_SUMMARY: &str = "New resources available! (Enable a summarizer for detailed summaries)";
pub const OFFLINE_TITLE: &str = "CRITICAL: Cluster Unreachable. Monitoring paused.";
pub const RESTORED_TITLE: &str = "Cluster Connection Restored.";
pub const AVAILABLE_TITLE: &str = "New Resources Available!";
pub const JOB_FINISHED_TITLE: &str = "Job Finished!";

const TOP_USERS: usize = 5;

/// Delivers a rendered notification somewhere.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> WatchResult<()>;
}

/// Turns a batch of available nodes into human-readable text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, nodes: &[NodeAvailability], queue: &QueueSummary) -> WatchResult<String>;
}

/// One deterministic line per node.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainSummarizer;

impl PlainSummarizer {
    pub fn line(node: &NodeAvailability) -> String {
        let mut line = format!(
            "{}: {} | {}/{} Cores | {:.1}GB RAM",
            node.name,
            node.state.label(),
            node.cpu_free(),
            node.cpu_total,
            node.memory.free_gb
        );
        if node.memory.is_unavailable() {
            line.push_str(" (Stale)");
        }
        line
    }
}

#[async_trait]
impl Summarizer for PlainSummarizer {
    async fn summarize(&self, nodes: &[NodeAvailability], _queue: &QueueSummary) -> WatchResult<String> {
        if nodes.is_empty() {
            return Ok("No new resources detected.".to_string());
        }
        Ok(nodes.iter().map(Self::line).collect::<Vec<_>>().join("\n"))
    }
}

/// Writes notifications to the log instead of a chat.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> WatchResult<()> {
        tracing::info!(title = %notification.title, "{}", notification.plain_text());
        Ok(())
    }
}

pub struct Dispatcher {
    notifier: Box<dyn Notifier>,
    summarizer: Option<Box<dyn Summarizer>>,
    mention: Option<String>,
    utc_offset: FixedOffset,
}

impl Dispatcher {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self {
            notifier,
            summarizer: None,
            mention: None,
            utc_offset: Utc.fix(),
        }
    }

    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Text prepended to job notifications, e.g. a chat user mention.
    pub fn with_mention(mut self, mention: impl Into<String>) -> Self {
        self.mention = Some(mention.into());
        self
    }

    /// Offset used for the local time shown in messages.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub async fn render(&self, alert: &Alert) -> Notification {
        self.render_at(alert, Utc::now()).await
    }

    pub async fn render_at(&self, alert: &Alert, now: DateTime<Utc>) -> Notification {
        let time = now
            .with_timezone(&self.utc_offset)
            .format("%H:%M:%S")
            .to_string();
        match alert {
            Alert::ClusterOffline => Notification::new(OFFLINE_TITLE, ""),
            Alert::ClusterRestored => Notification::new(RESTORED_TITLE, ""),
            Alert::NodesAvailable { nodes, queue } => {
                let summary = self.summarize(nodes, queue).await;
                Notification::new(
                    AVAILABLE_TITLE,
                    format!("{}\n{}\nTime: {}", summary, queue_line(queue), time),
                )
            }
            Alert::JobFinished { job_id, job } => {
                let notification = Notification::new(
                    JOB_FINISHED_TITLE,
                    format!("{}\nTime: {}", job_line(job_id, job), time),
                );
                match &self.mention {
                    Some(mention) => notification.with_content(mention.clone()),
                    None => notification,
                }
            }
        }
    }

    async fn summarize(&self, nodes: &[NodeAvailability], queue: &QueueSummary) -> String {
        let Some(summarizer) = &self.summarizer else {
            return FALLBACK_SUMMARY.to_string();
        };
        match summarizer.summarize(nodes, queue).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(error = %error, "summarizer failed; using fallback text");
                FALLBACK_SUMMARY.to_string()
            }
        }
    }

    /// Renders and sends one alert. Failures are logged.
    pub async fn dispatch(&self, alert: &Alert) {
        let notification = self.render(alert).await;
        if let Err(error) = self.notifier.send(&notification).await {
            tracing::warn!(alert = alert.kind(), error = %error, "failed to deliver notification");
        }
    }

    pub async fn dispatch_all(&self, alerts: &[Alert]) {
        for alert in alerts {
            self.dispatch(alert).await;
        }
    }
}

fn queue_line(queue: &QueueSummary) -> String {
    let mut line = format!("Queue: {} jobs", queue.total_jobs);
    let top = queue.top_users(TOP_USERS);
    if !top.is_empty() {
        let users: Vec<String> = top
            .iter()
            .map(|(user, count)| format!("{} ({})", user, count))
            .collect();
        line.push_str(" | Top users: ");
        line.push_str(&users.join(", "));
    }
    line
}

fn job_line(job_id: &str, job: &JobRecord) -> String {
    format!("Job: '{}' (ID: {}) on {}", job.name, job_id, job.node)
}
