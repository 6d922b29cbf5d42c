use std::time::Duration;
use thiserror::Error;

/// The main error type for cluster watching operations.
///
/// This enum represents all possible errors that can occur while talking to
/// the cluster through the tunnel, parsing scheduler output, persisting
/// history and delivering notifications.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Represents failures of the tunnel itself (TCP, SSH handshake, channel)
    ///
    /// # Fields
    /// * `0` - A description of what went wrong on the wire
    #[error("Transport error: {0}")]
    Transport(String),

    /// Represents a rejected login on one of the hops
    ///
    /// # Fields
    /// * `0` - A description of the authentication failure
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Represents an operation that did not finish within its deadline
    ///
    /// # Fields
    /// * `operation` - What was being attempted
    /// * `after` - The deadline that elapsed
    #[error("Timeout while {operation} (after {after:?})")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The two-hop session could not be established
    ///
    /// # Fields
    /// * `attempts` - How many attempts were made before giving up
    /// * `source` - The cause reported by the last attempt
    #[error("Cluster unreachable after {attempts} attempt(s): {source}")]
    Connectivity {
        attempts: u32,
        #[source]
        source: Box<WatchError>,
    },

    /// Represents failures to read or write local state files
    ///
    /// # Fields
    /// * `0` - Description of the failed disk operation
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Represents failures to deliver a rendered notification
    ///
    /// # Fields
    /// * `0` - Description of the delivery failure
    #[error("Notification error: {0}")]
    Notification(String),

    /// Represents validation failures with detailed context
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl WatchError {
    /// Returns true when the error describes a failure of the remote path
    /// rather than of local state or configuration.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WatchError::Transport(_)
                | WatchError::Authentication(_)
                | WatchError::Timeout { .. }
                | WatchError::Connectivity { .. }
        )
    }
}

impl From<std::io::Error> for WatchError {
    fn from(error: std::io::Error) -> Self {
        WatchError::Persistence(error.to_string())
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(error: serde_json::Error) -> Self {
        WatchError::Persistence(format!("JSON encoding failed: {}", error))
    }
}

impl From<russh::Error> for WatchError {
    fn from(error: russh::Error) -> Self {
        WatchError::Transport(error.to_string())
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    ///
    /// # Fields
    /// * `0` - Description of the format violation
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    ///
    /// # Fields
    /// * `0` - Description of the constraint violation
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Type alias for Results that may fail with a WatchError
pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_error_keeps_last_cause() {
        let err = WatchError::Connectivity {
            attempts: 3,
            source: Box::new(WatchError::Transport("connection refused".to_string())),
        };
        assert!(err.to_string().contains("3 attempt(s)"));
        assert!(err.to_string().contains("connection refused"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Transport error: connection refused")
        );
    }

    #[test]
    fn test_is_transport_classification() {
        assert!(WatchError::Transport("x".into()).is_transport());
        assert!(
            WatchError::Timeout {
                operation: "opening gateway",
                after: Duration::from_secs(5)
            }
            .is_transport()
        );
        assert!(!WatchError::Persistence("disk full".into()).is_transport());
        assert!(!WatchError::Notification("bad".into()).is_transport());
    }

    #[test]
    fn test_io_error_maps_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WatchError = io.into();
        assert!(matches!(err, WatchError::Persistence(_)));
    }
}
