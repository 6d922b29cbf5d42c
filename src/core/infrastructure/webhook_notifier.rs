//! Chat webhook delivery of rendered notifications.

use crate::{
    core::domain::{
        error::{WatchError, WatchResult},
        model::Notification,
        value_object::WebhookUrl,
    },
    monitor::application::service::dispatcher::Notifier,
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::Client;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
}

impl<'a> From<&'a Notification> for WebhookPayload<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            content: notification.content.as_deref(),
            embeds: [Embed {
                title: &notification.title,
                description: &notification.description,
            }],
        }
    }
}

/// Posts notifications as JSON to a chat webhook.
///
/// With a rate limit configured, a burst of alerts (typically right after an
/// outage ends) is spread out instead of being rejected by the chat server.
#[derive(Debug)]
pub struct WebhookNotifier {
    http_client: Client,
    url: WebhookUrl,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl WebhookNotifier {
    /// Creates a notifier for `url`, optionally limited to `per_minute` posts.
    ///
    /// # Errors
    /// Returns `WatchError::Notification` if the HTTP client cannot be built.
    pub fn new(url: WebhookUrl, per_minute: Option<NonZeroU32>) -> WatchResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WatchError::Notification(e.to_string()))?;

        let rate_limiter =
            per_minute.map(|n| Arc::new(DefaultDirectRateLimiter::direct(Quota::per_minute(n))));

        Ok(Self {
            http_client,
            url,
            rate_limiter,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> WatchResult<()> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let response = self
            .http_client
            .post(self.url.as_url().clone())
            .json(&WebhookPayload::from(notification))
            .send()
            .await
            .map_err(|e| WatchError::Notification(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(WatchError::Notification(format!(
                "webhook rejected message ({}): {}",
                status, error_text
            )));
        }
        Ok(())
    }
}
