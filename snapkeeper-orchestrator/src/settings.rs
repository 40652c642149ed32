use anyhow::{bail, Context, Result};
use snapkeeper_common::actions::{DEFAULT_ALERT_SUBJECT, DEFAULT_ALERT_TOPIC_ARN};
use std::time::Duration;

use crate::retention::{RetentionMode, RetentionPolicy};
use crate::retry::RetryPolicy;

pub const DEFAULT_PROVIDER: &str = "aws";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_NAME_PLACEHOLDER: &str = "random";

/// Job configuration. Defaults match the values the job has always run with;
/// every field can be overridden from the environment (or a `.env` file).
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: String,
    pub region: String,
    pub retention: RetentionPolicy,
    pub alert_topic_arn: String,
    pub alert_subject: String,
    /// Label used for instances without a usable `Name` tag.
    pub name_placeholder: String,
    /// Treat images of `stopping` instances as referenced.
    pub protect_stopping_images: bool,
    /// Alert on snapshot deletion errors other than "in use".
    pub notify_snapshot_errors: bool,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            region: DEFAULT_REGION.to_string(),
            retention: RetentionPolicy::default(),
            alert_topic_arn: DEFAULT_ALERT_TOPIC_ARN.to_string(),
            alert_subject: DEFAULT_ALERT_SUBJECT.to_string(),
            name_placeholder: DEFAULT_NAME_PLACEHOLDER.to_string(),
            protect_stopping_images: false,
            notify_snapshot_errors: false,
            retry: RetryPolicy::default(),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got {:?}", key, other),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let mut s = Settings::default();

        if let Some(v) = get("PROVIDER") {
            s.provider = v.to_lowercase();
        }
        if let Some(v) = get("EC2_REGION") {
            s.region = v;
        }
        if let Some(v) = get("RETENTION_DAYS") {
            s.retention.threshold_days = v
                .parse::<i64>()
                .with_context(|| format!("RETENTION_DAYS must be an integer, got {:?}", v))?;
            if s.retention.threshold_days < 0 {
                bail!("RETENTION_DAYS must not be negative");
            }
        }
        if let Some(v) = get("RETENTION_MODE") {
            s.retention.mode = RetentionMode::parse(&v).with_context(|| {
                format!("RETENTION_MODE must be 'within' or 'older-than', got {:?}", v)
            })?;
        }
        if let Some(v) = get("ALERT_TOPIC_ARN") {
            s.alert_topic_arn = v;
        }
        if let Some(v) = get("ALERT_SUBJECT") {
            s.alert_subject = v;
        }
        if let Some(v) = get("NAME_TAG_PLACEHOLDER") {
            s.name_placeholder = v;
        }
        if let Some(v) = get("PROTECT_STOPPING_IMAGES") {
            s.protect_stopping_images = parse_bool("PROTECT_STOPPING_IMAGES", &v)?;
        }
        if let Some(v) = get("NOTIFY_SNAPSHOT_ERRORS") {
            s.notify_snapshot_errors = parse_bool("NOTIFY_SNAPSHOT_ERRORS", &v)?;
        }
        if let Some(v) = get("PROVIDER_MAX_ATTEMPTS") {
            let attempts = v
                .parse::<u32>()
                .with_context(|| format!("PROVIDER_MAX_ATTEMPTS must be a positive integer, got {:?}", v))?;
            if attempts == 0 {
                bail!("PROVIDER_MAX_ATTEMPTS must be a positive integer, got {:?}", v);
            }
            s.retry.max_attempts = attempts;
        }
        if let Some(v) = get("PROVIDER_RETRY_BASE_MS") {
            let ms = v
                .parse::<u64>()
                .with_context(|| format!("PROVIDER_RETRY_BASE_MS must be an integer, got {:?}", v))?;
            s.retry.base_delay = Duration::from_millis(ms);
        }

        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.provider, "aws");
        assert_eq!(s.region, "us-east-1");
        assert_eq!(s.retention, RetentionPolicy::default());
        assert_eq!(s.alert_topic_arn, DEFAULT_ALERT_TOPIC_ARN);
        assert_eq!(s.alert_subject, "Issue Creating or Deleting AMI");
        assert_eq!(s.name_placeholder, "random");
        assert!(!s.protect_stopping_images);
        assert!(!s.notify_snapshot_errors);
        assert_eq!(s.retry, RetryPolicy::default());
    }

    #[test]
    fn overrides_are_applied() {
        let s = settings(&[
            ("PROVIDER", "Mock"),
            ("EC2_REGION", "sa-east-1"),
            ("RETENTION_DAYS", "14"),
            ("RETENTION_MODE", "older-than"),
            ("PROTECT_STOPPING_IMAGES", "yes"),
            ("NOTIFY_SNAPSHOT_ERRORS", "1"),
            ("PROVIDER_MAX_ATTEMPTS", "5"),
            ("PROVIDER_RETRY_BASE_MS", "50"),
            ("NAME_TAG_PLACEHOLDER", "unnamed"),
        ])
        .unwrap();
        assert_eq!(s.provider, "mock");
        assert_eq!(s.region, "sa-east-1");
        assert_eq!(s.retention.threshold_days, 14);
        assert_eq!(s.retention.mode, RetentionMode::OlderThan);
        assert!(s.protect_stopping_images);
        assert!(s.notify_snapshot_errors);
        assert_eq!(s.retry.max_attempts, 5);
        assert_eq!(s.retry.base_delay, Duration::from_millis(50));
        assert_eq!(s.name_placeholder, "unnamed");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let s = settings(&[("EC2_REGION", "  "), ("RETENTION_DAYS", "")]).unwrap();
        assert_eq!(s.region, "us-east-1");
        assert_eq!(s.retention.threshold_days, 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(settings(&[("RETENTION_DAYS", "a week")]).is_err());
        assert!(settings(&[("RETENTION_DAYS", "-1")]).is_err());
        assert!(settings(&[("RETENTION_MODE", "newest")]).is_err());
        assert!(settings(&[("NOTIFY_SNAPSHOT_ERRORS", "maybe")]).is_err());
        assert!(settings(&[("PROVIDER_MAX_ATTEMPTS", "0")]).is_err());
        assert!(settings(&[("PROVIDER_MAX_ATTEMPTS", "-2")]).is_err());
    }
}
