//! Scoped two-hop sessions with bounded retries.

use crate::core::{
    domain::error::{WatchError, WatchResult},
    infrastructure::transport::{RemoteOutput, TunnelTransport},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Deadline for one attempt at building a full session, both hops included.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the gateway-only reachability check.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// How many times to attempt an operation and how long to wait between attempts.
///
/// The policy knows nothing about transports; it only classifies errors and
/// sequences attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Transport failures and timeouts may succeed on a later attempt;
    /// rejected credentials and bad configuration will not.
    pub fn is_retryable(&self, error: &WatchError) -> bool {
        matches!(error, WatchError::Transport(_) | WatchError::Timeout { .. })
    }

    /// Runs `operation` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `operation` receives the 1-based attempt number. The delay is only
    /// applied between attempts. Every failure is reported as
    /// `WatchError::Connectivity` carrying the last cause.
    pub async fn run<O, F, Fut>(&self, mut operation: F) -> WatchResult<O>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = WatchResult<O>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts && self.is_retryable(&error) => {
                    tracing::warn!(attempt, max_attempts, error = %error, "connection attempt failed");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::warn!(attempt, max_attempts, error = %error, "giving up on connection");
                    return Err(WatchError::Connectivity {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }
        }
    }
}

/// A working two-hop command channel.
///
/// Call [`Session::close`] for an orderly teardown. A session that is dropped
/// instead (for example because the caller was cancelled) drops both hop
/// handles, which closes their connections.
pub struct Session<'a, T: TunnelTransport> {
    transport: &'a T,
    gateway: Option<T::Gateway>,
    target: Option<T::Target>,
}

impl<T: TunnelTransport> Session<'_, T> {
    /// Runs `command` on the target host.
    pub async fn exec(&self, command: &str, timeout: Option<Duration>) -> WatchResult<RemoteOutput> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| WatchError::Transport("session already closed".to_string()))?;
        self.transport.exec(target, command, timeout).await
    }

    /// Tears down the target hop, then the gateway hop.
    pub async fn close(mut self) {
        if let Some(target) = self.target.take() {
            self.transport.close_target(target).await;
        }
        if let Some(gateway) = self.gateway.take() {
            self.transport.close_gateway(gateway).await;
        }
    }
}

/// Hands out sessions over a shared transport.
pub struct SessionManager<T: TunnelTransport> {
    transport: Arc<T>,
    policy: RetryPolicy,
    session_timeout: Duration,
    heartbeat_timeout: Duration,
}

impl<T: TunnelTransport> SessionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            policy: RetryPolicy::default(),
            session_timeout: SESSION_TIMEOUT,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
        }
    }

    /// Builds a full session, retrying per the policy.
    ///
    /// # Errors
    /// Returns `WatchError::Connectivity` with the last cause once attempts
    /// are exhausted or a fatal error is seen.
    pub async fn acquire(&self) -> WatchResult<Session<'_, T>> {
        self.policy
            .run(|attempt| async move { self.open_session(attempt).await })
            .await
    }

    async fn open_session(&self, attempt: u32) -> WatchResult<Session<'_, T>> {
        tracing::debug!(attempt, "opening session");
        // A hop abandoned at the deadline is released when its handle drops.
        tokio::time::timeout(self.session_timeout, self.open_hops())
            .await
            .map_err(|_| WatchError::Timeout {
                operation: "opening session",
                after: self.session_timeout,
            })?
    }

    async fn open_hops(&self) -> WatchResult<Session<'_, T>> {
        let gateway = self.transport.open_gateway(self.session_timeout).await?;
        match self.transport.open_target(&gateway, self.session_timeout).await {
            Ok(target) => Ok(Session {
                transport: self.transport.as_ref(),
                gateway: Some(gateway),
                target: Some(target),
            }),
            Err(error) => {
                self.transport.close_gateway(gateway).await;
                Err(error)
            }
        }
    }

    /// Checks that the gateway accepts a login. Never fails; any error is `false`.
    pub async fn heartbeat(&self) -> bool {
        match self.transport.open_gateway(self.heartbeat_timeout).await {
            Ok(gateway) => {
                self.transport.close_gateway(gateway).await;
                true
            }
            Err(error) => {
                tracing::debug!(error = %error, "heartbeat failed");
                false
            }
        }
    }
}
