use crate::core::domain::error::ValidationError;
use std::fmt;
use std::num::NonZeroU16;

const SSH_DEFAULT_PORT: NonZeroU16 = NonZeroU16::MIN.saturating_add(21);

/// TCP port of an SSH daemon. Zero is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SshPort(NonZeroU16);

impl SshPort {
    /// Wraps a port that already passed [`validate_port`]; zero falls back to 22.
    pub(crate) fn new_unchecked(port: u16) -> Self {
        Self(NonZeroU16::new(port).unwrap_or(SSH_DEFAULT_PORT))
    }

    pub fn get(&self) -> u16 {
        self.0.get()
    }
}

impl Default for SshPort {
    fn default() -> Self {
        Self(SSH_DEFAULT_PORT)
    }
}

impl fmt::Display for SshPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn validate_port(port: u16) -> Result<(), ValidationError> {
    NonZeroU16::new(port)
        .map(|_| ())
        .ok_or_else(|| ValidationError::Field {
            field: "port".to_string(),
            message: "Port cannot be 0".to_string(),
        })
}
