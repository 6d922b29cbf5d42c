use crate::core::domain::error::ValidationError;

/// A validated login name, used both for SSH hops and for the tracked
/// cluster user whose jobs are followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshUsername(String);

impl SshUsername {
    /// Creates a new username without validation.
    pub(crate) fn new_unchecked(username: String) -> Self {
        Self(username)
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the object and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Validates a POSIX-style login name.
pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Field {
            field: "username".to_string(),
            message: "Username cannot be empty".to_string(),
        });
    }
    if username.len() > 32 {
        return Err(ValidationError::Format(format!(
            "Username length must be at most 32 characters (got {})",
            username.len()
        )));
    }
    if username.starts_with('-') {
        return Err(ValidationError::Format(
            "Username cannot start with a hyphen".to_string(),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.';
    if !username.chars().all(allowed) {
        return Err(ValidationError::Format(
            "Username contains invalid characters. Allowed: alphanumeric, -, _, .".to_string(),
        ));
    }
    Ok(())
}
