use crate::core::domain::error::ValidationError;

/// A single word that is safe to splice into a remote shell command:
/// a node name, a comma-separated node list or a user name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteToken(String);

impl RemoteToken {
    /// Validates `value` and wraps it.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_remote_token(&value)?;
        Ok(Self(value))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates that a token contains only characters Slurm uses in node and
/// user names (plus `,` and `[]` for host lists).
pub(crate) fn validate_remote_token(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Field {
            field: "token".to_string(),
            message: "Remote command argument cannot be empty".to_string(),
        });
    }
    if value.starts_with('-') {
        return Err(ValidationError::Format(
            "Remote command argument cannot start with a hyphen".to_string(),
        ));
    }
    let allowed = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ',' | '[' | ']')
    };
    if !value.chars().all(allowed) {
        return Err(ValidationError::Format(format!(
            "Remote command argument '{}' contains unsupported characters",
            value
        )));
    }
    Ok(())
}
