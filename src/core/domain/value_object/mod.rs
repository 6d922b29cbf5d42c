mod remote_token;
mod ssh_host;
mod ssh_password;
mod ssh_port;
mod ssh_username;
mod webhook_url;

pub use remote_token::RemoteToken;
pub use ssh_host::SshHost;
pub use ssh_password::SshPassword;
pub use ssh_port::SshPort;
pub use ssh_username::SshUsername;
pub use webhook_url::WebhookUrl;

// Re-export validation functions for internal use
pub(crate) use ssh_host::validate_host;
pub(crate) use ssh_password::validate_password;
pub(crate) use ssh_port::validate_port;
pub(crate) use ssh_username::validate_username;
pub(crate) use webhook_url::validate_webhook_url;
