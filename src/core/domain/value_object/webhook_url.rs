use crate::core::domain::error::ValidationError;

const MAX_URL_LENGTH: usize = 2083;

/// A validated chat webhook URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookUrl(url::Url);

impl WebhookUrl {
    /// Creates a new webhook URL without validation.
    pub(crate) fn new_unchecked(url: url::Url) -> Self {
        Self(url)
    }

    /// Returns the parsed URL.
    pub fn as_url(&self) -> &url::Url {
        &self.0
    }
}

/// Validates and parses a webhook URL. Only `http` and `https` are accepted.
pub(crate) fn validate_webhook_url(raw: &str) -> Result<url::Url, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Field {
            field: "webhook_url".to_string(),
            message: "URL cannot be empty".to_string(),
        });
    }

    if raw.len() > MAX_URL_LENGTH {
        return Err(ValidationError::Format(format!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        )));
    }

    let parsed = url::Url::parse(raw)
        .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "https" | "http" => {}
        other => {
            return Err(ValidationError::ConstraintViolation(format!(
                "Invalid scheme '{}'. Must be one of: http, https",
                other
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::ConstraintViolation(
            "Webhook URL must include a host".to_string(),
        ));
    }

    Ok(parsed)
}
