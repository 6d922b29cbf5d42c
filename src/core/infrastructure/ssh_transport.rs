//! russh implementation of the two-hop tunnel.
//!
//! Hop 1 is a plain TCP SSH connection to the gateway. Hop 2 is a second SSH
//! connection whose byte stream is a `direct-tcpip` channel of hop 1, so the
//! target never needs to be routable from this machine.

use crate::{
    auth::application::service::login_service::LoginService,
    core::{
        domain::{
            error::{WatchError, WatchResult},
            model::SshEndpoint,
        },
        infrastructure::transport::{RemoteOutput, TunnelTransport},
    },
};
use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts;
use russh::keys::ssh_key::PublicKey;
use russh::{ChannelMsg, Disconnect};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Host-key policy: trust on first use, reject a changed key.
#[derive(Debug, Clone)]
struct TunnelHandler {
    host: String,
    port: u16,
}

impl client::Handler for TunnelHandler {
    type Error = WatchError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        verify_host_key(&self.host, self.port, server_public_key, None)
    }
}

/// Checks `key` against a known_hosts file, the user's own when `file` is
/// `None`. An unknown host is learned; a changed key is an error.
fn verify_host_key(
    host: &str,
    port: u16,
    key: &PublicKey,
    file: Option<&Path>,
) -> WatchResult<bool> {
    let checked = match file {
        Some(path) => known_hosts::check_known_hosts_path(host, port, key, path),
        None => known_hosts::check_known_hosts(host, port, key),
    };
    match checked {
        Ok(true) => Ok(true),
        Ok(false) => {
            tracing::info!(host, port, "learning server key");
            let learned = match file {
                Some(path) => known_hosts::learn_known_hosts_path(host, port, key, path),
                None => known_hosts::learn_known_hosts(host, port, key),
            };
            if let Err(e) = learned {
                tracing::warn!(host, error = %e, "could not record server key");
            }
            Ok(true)
        }
        Err(e) => Err(WatchError::Transport(format!(
            "server key validation failed for {}:{}: {}",
            host, port, e
        ))),
    }
}

/// An authenticated SSH connection to one hop.
pub struct SshHop {
    handle: Handle<TunnelHandler>,
    address: String,
}

impl SshHop {
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Opens gateway and target connections with password authentication.
pub struct SshTransport {
    gateway: SshEndpoint,
    target: SshEndpoint,
    config: Arc<Config>,
    login: LoginService,
}

impl SshTransport {
    pub fn new(gateway: SshEndpoint, target: SshEndpoint) -> Self {
        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        Self {
            gateway,
            target,
            config: Arc::new(config),
            login: LoginService::new(),
        }
    }

    fn handler_for(endpoint: &SshEndpoint) -> TunnelHandler {
        TunnelHandler {
            host: endpoint.host().as_str().to_string(),
            port: endpoint.port().get(),
        }
    }

    async fn disconnect(hop: SshHop) {
        if let Err(e) = hop
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!(host = %hop.address, error = %e, "disconnect failed");
        }
    }
}

async fn with_deadline<T, F>(operation: &'static str, after: Duration, fut: F) -> WatchResult<T>
where
    F: Future<Output = WatchResult<T>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| WatchError::Timeout { operation, after })?
}

#[async_trait]
impl TunnelTransport for SshTransport {
    type Gateway = SshHop;
    type Target = SshHop;

    #[tracing::instrument(skip(self), fields(host = %self.gateway.address()))]
    async fn open_gateway(&self, timeout: Duration) -> WatchResult<SshHop> {
        let endpoint = &self.gateway;
        with_deadline("opening gateway", timeout, async {
            let mut handle = client::connect(
                self.config.clone(),
                (endpoint.host().as_str(), endpoint.port().get()),
                Self::handler_for(endpoint),
            )
            .await?;
            self.login.execute(&mut handle, endpoint).await?;
            Ok(SshHop {
                handle,
                address: endpoint.address(),
            })
        })
        .await
    }

    #[tracing::instrument(skip(self, gateway), fields(host = %self.target.address()))]
    async fn open_target(&self, gateway: &SshHop, timeout: Duration) -> WatchResult<SshHop> {
        let endpoint = &self.target;
        with_deadline("opening target", timeout, async {
            let channel = gateway
                .handle
                .channel_open_direct_tcpip(
                    endpoint.host().as_str(),
                    u32::from(endpoint.port().get()),
                    "127.0.0.1",
                    0,
                )
                .await?;
            let mut handle = client::connect_stream(
                self.config.clone(),
                channel.into_stream(),
                Self::handler_for(endpoint),
            )
            .await?;
            self.login.execute(&mut handle, endpoint).await?;
            Ok(SshHop {
                handle,
                address: endpoint.address(),
            })
        })
        .await
    }

    async fn exec(
        &self,
        target: &SshHop,
        command: &str,
        timeout: Option<Duration>,
    ) -> WatchResult<RemoteOutput> {
        let run = async {
            let mut channel = target.handle.channel_open_session().await?;
            channel.exec(true, command).await?;
            let mut stdout = Vec::new();
            let mut exit_status = None;
            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                    ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                    ChannelMsg::Close => break,
                    _ => {}
                }
            }
            let _ = channel.close().await;
            if exit_status == Some(0) {
                Ok(RemoteOutput::ok(String::from_utf8_lossy(&stdout)))
            } else {
                tracing::debug!(command, ?exit_status, "remote command failed");
                Ok(RemoteOutput::failed())
            }
        };
        tracing::debug!(host = %target.address, command, "executing");
        match timeout {
            Some(after) => with_deadline("running remote command", after, run).await,
            None => run.await,
        }
    }

    async fn close_target(&self, target: SshHop) {
        Self::disconnect(target).await;
    }

    async fn close_gateway(&self, gateway: SshHop) {
        Self::disconnect(gateway).await;
    }
}
