use crate::core::domain::{
    error::{WatchError, WatchResult},
    model::SshEndpoint,
};
use russh::client::{AuthResult, Handle, Handler};

/// Password login on an already-negotiated SSH handle.
///
/// Both hops of the tunnel use the same service; only the endpoint differs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoginService;

impl LoginService {
    pub fn new() -> Self {
        Self
    }

    /// Authenticates `handle` with the endpoint's username and password.
    ///
    /// # Errors
    /// Returns `WatchError::Authentication` when the server rejects the
    /// credentials and `WatchError::Transport` when the exchange itself fails.
    pub async fn execute<H>(&self, handle: &mut Handle<H>, endpoint: &SshEndpoint) -> WatchResult<()>
    where
        H: Handler,
    {
        let result = handle
            .authenticate_password(endpoint.username().as_str(), endpoint.password().as_str())
            .await
            .map_err(|e| WatchError::Transport(format!("password exchange failed: {}", e)))?;
        self.handle_auth_result(result, endpoint)
    }

    fn handle_auth_result(&self, result: AuthResult, endpoint: &SshEndpoint) -> WatchResult<()> {
        match result {
            AuthResult::Success => {
                tracing::debug!(host = %endpoint.address(), user = %endpoint.username().as_str(), "authenticated");
                Ok(())
            }
            AuthResult::Failure {
                remaining_methods,
                partial_success,
            } => {
                tracing::debug!(
                    host = %endpoint.address(),
                    partial_success,
                    remaining = ?remaining_methods,
                    "password rejected"
                );
                Err(rejection(endpoint))
            }
        }
    }
}

fn rejection(endpoint: &SshEndpoint) -> WatchError {
    WatchError::Authentication(format!(
        "password rejected for {}@{}",
        endpoint.username().as_str(),
        endpoint.address()
    ))
}
