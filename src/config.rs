//! Environment-driven configuration.
//!
//! Every setting is read from a `SLURMWATCH_*` variable; a `.env` file in the
//! working directory is loaded first when present.

use crate::{SlurmWatchBuilder, ValidationError, WatchError, WatchResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "SLURMWATCH_";

fn parse_var<V: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> WatchResult<Option<V>> {
    let Some(raw) = lookup(&format!("{}{}", ENV_PREFIX, name)) else {
        return Ok(None);
    };
    raw.trim().parse::<V>().map(Some).map_err(|_| {
        WatchError::Validation(ValidationError::Field {
            field: format!("{}{}", ENV_PREFIX, name),
            message: format!("'{}' is not a valid value", raw),
        })
    })
}

fn text_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.trim().is_empty())
}

/// Builds a [`SlurmWatchBuilder`] from an arbitrary variable lookup.
///
/// Unset variables leave the builder default in place. Required connection
/// settings are only enforced later, by `build()`.
///
/// # Errors
/// Returns `WatchError::Validation` when a numeric variable does not parse.
pub fn builder_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> WatchResult<SlurmWatchBuilder> {
    let mut builder = SlurmWatchBuilder::default();

    if let Some(host) = text_var(&lookup, "GATEWAY_HOST") {
        let port = parse_var::<u16>(&lookup, "GATEWAY_PORT")?.unwrap_or(22);
        builder = builder.gateway(host, port);
    }
    if let (Some(user), Some(password)) = (
        text_var(&lookup, "GATEWAY_USER"),
        lookup(&format!("{}GATEWAY_PASSWORD", ENV_PREFIX)),
    ) {
        builder = builder.gateway_credentials(user, password);
    }
    if let Some(host) = text_var(&lookup, "TARGET_HOST") {
        let port = parse_var::<u16>(&lookup, "TARGET_PORT")?.unwrap_or(22);
        builder = builder.target(host, port);
    }
    if let (Some(user), Some(password)) = (
        text_var(&lookup, "TARGET_USER"),
        lookup(&format!("{}TARGET_PASSWORD", ENV_PREFIX)),
    ) {
        builder = builder.target_credentials(user, password);
    }

    if let Some(secs) = parse_var::<u64>(&lookup, "CHECK_INTERVAL")? {
        builder = builder.check_interval(Duration::from_secs(secs));
    }
    if let Some(user) = text_var(&lookup, "TRACKED_USER") {
        builder = builder.tracked_user(user);
    }
    if let Some(mention) = text_var(&lookup, "MENTION") {
        builder = builder.mention(mention);
    }
    if let Some(url) = text_var(&lookup, "WEBHOOK_URL") {
        builder = builder.webhook_url(url);
    }
    if let Some(per_minute) = parse_var::<u32>(&lookup, "WEBHOOK_PER_MINUTE")? {
        builder = builder.webhook_per_minute(per_minute);
    }
    if let Some(hours) = parse_var::<i32>(&lookup, "UTC_OFFSET_HOURS")? {
        builder = builder.utc_offset_hours(hours);
    }
    if let Some(dir) = text_var(&lookup, "DATA_DIR") {
        builder = builder.data_dir(PathBuf::from(dir));
    }
    if let Some(prefix) = text_var(&lookup, "NODE_PREFIX") {
        builder = builder.node_prefix(prefix);
    }

    Ok(builder)
}

/// Loads `.env` if present, then reads the process environment.
pub fn builder_from_env() -> WatchResult<SlurmWatchBuilder> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        Err(error) if error.not_found() => {}
        Err(error) => tracing::warn!(error = %error, "ignoring unreadable environment file"),
    }
    builder_from_lookup(|name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn connection() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GATEWAY_HOST", "bastion.example.org"),
            ("GATEWAY_PORT", "7722"),
            ("GATEWAY_USER", "carlos"),
            ("GATEWAY_PASSWORD", "outer-secret"),
            ("TARGET_HOST", "192.168.16.100"),
            ("TARGET_USER", "carlos"),
            ("TARGET_PASSWORD", "inner-secret"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let watch = builder_from_lookup(lookup(&connection()))
            .unwrap()
            .build()
            .unwrap();
        let settings = watch.settings();
        assert_eq!(settings.check_interval, Duration::from_secs(300));
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.utc_offset.local_minus_utc(), 0);
        assert!(settings.tracked_user.is_none());
        assert!(settings.webhook_url.is_none());
    }

    #[test]
    fn test_optional_settings_read() {
        let mut vars = connection();
        vars.extend([
            ("CHECK_INTERVAL", "60"),
            ("TRACKED_USER", "carlos"),
            ("MENTION", "<@42>"),
            ("WEBHOOK_URL", "https://chat.example.org/api/webhooks/1/abc"),
            ("WEBHOOK_PER_MINUTE", "20"),
            ("UTC_OFFSET_HOURS", "-5"),
            ("DATA_DIR", "/var/lib/slurm-watch"),
        ]);
        let watch = builder_from_lookup(lookup(&vars)).unwrap().build().unwrap();
        let settings = watch.settings();
        assert_eq!(settings.check_interval, Duration::from_secs(60));
        assert_eq!(settings.tracked_user.as_deref(), Some("carlos"));
        assert_eq!(settings.mention.as_deref(), Some("<@42>"));
        assert_eq!(settings.webhook_per_minute.map(|n| n.get()), Some(20));
        assert_eq!(settings.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/slurm-watch"));
    }

    #[test]
    fn test_bad_number_is_field_error() {
        let mut vars = connection();
        vars.push(("CHECK_INTERVAL", "five minutes"));
        let result = builder_from_lookup(lookup(&vars));
        assert!(matches!(
            result,
            Err(WatchError::Validation(ValidationError::Field { ref field, .. }))
                if field == "SLURMWATCH_CHECK_INTERVAL"
        ));
    }

    #[test]
    fn test_missing_target_rejected_at_build() {
        let vars: Vec<_> = connection()
            .into_iter()
            .filter(|(k, _)| !k.starts_with("TARGET"))
            .collect();
        let result = builder_from_lookup(lookup(&vars)).unwrap().build();
        assert!(matches!(
            result,
            Err(WatchError::Validation(ValidationError::Field { ref field, .. }))
                if field == "target_host"
        ));
    }

    #[test]
    fn test_blank_optional_values_ignored() {
        let mut vars = connection();
        vars.extend([("TRACKED_USER", "  "), ("WEBHOOK_URL", "")]);
        let watch = builder_from_lookup(lookup(&vars)).unwrap().build().unwrap();
        assert!(watch.settings().tracked_user.is_none());
        assert!(watch.settings().webhook_url.is_none());
    }
}
