use crate::core::domain::value_object::{SshHost, SshPassword, SshPort, SshUsername};

/// Address and credentials of one hop of the tunnel.
#[derive(Debug, Clone)]
pub struct SshEndpoint {
    host: SshHost,
    port: SshPort,
    username: SshUsername,
    password: SshPassword,
}

impl SshEndpoint {
    pub fn new(host: SshHost, port: SshPort, username: SshUsername, password: SshPassword) -> Self {
        Self {
            host,
            port,
            username,
            password,
        }
    }

    pub fn host(&self) -> &SshHost {
        &self.host
    }

    pub fn port(&self) -> &SshPort {
        &self.port
    }

    pub fn username(&self) -> &SshUsername {
        &self.username
    }

    pub fn password(&self) -> &SshPassword {
        &self.password
    }

    /// `host:port`, as used in log fields.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port.get())
    }
}
