//! The two-hop tunnel as seen by the session manager.

use crate::core::domain::error::WatchResult;
use async_trait::async_trait;
use std::time::Duration;

/// Result of one remote command. A non-zero exit is reported, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub exit_ok: bool,
    pub stdout: String,
}

impl RemoteOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_ok: true,
            stdout: stdout.into(),
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

/// Builds and tears down the hops of the tunnel and runs commands on the target.
///
/// Hop 1 (`Gateway`) is the intermediary; hop 2 (`Target`) is reached through it.
/// Implementations must release a hop's resources when its handle is dropped, so a
/// cancelled caller never leaks a connection.
#[async_trait]
pub trait TunnelTransport: Send + Sync {
    type Gateway: Send + Sync;
    type Target: Send + Sync;

    async fn open_gateway(&self, timeout: Duration) -> WatchResult<Self::Gateway>;

    async fn open_target(
        &self,
        gateway: &Self::Gateway,
        timeout: Duration,
    ) -> WatchResult<Self::Target>;

    async fn exec(
        &self,
        target: &Self::Target,
        command: &str,
        timeout: Option<Duration>,
    ) -> WatchResult<RemoteOutput>;

    async fn close_target(&self, target: Self::Target);

    async fn close_gateway(&self, gateway: Self::Gateway);
}
