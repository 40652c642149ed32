use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an artifact's age is compared against the retention threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionMode {
    /// Delete artifacts whose age is at most the threshold (historical behavior).
    Within,
    /// Delete artifacts whose age is at least the threshold.
    OlderThan,
}

impl RetentionMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "within" => Some(RetentionMode::Within),
            "older-than" | "older_than" => Some(RetentionMode::OlderThan),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Within => "within",
            RetentionMode::OlderThan => "older-than",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub threshold_days: i64,
    pub mode: RetentionMode,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            threshold_days: 1,
            mode: RetentionMode::Within,
        }
    }
}

impl RetentionPolicy {
    pub fn should_delete(&self, age_days: i64) -> bool {
        match self.mode {
            RetentionMode::Within => age_days <= self.threshold_days,
            RetentionMode::OlderThan => age_days >= self.threshold_days,
        }
    }
}

/// Whole calendar days (UTC) between `created` and `now`. Time of day is ignored,
/// so something created at 23:59 yesterday is one day old at 00:01 today.
pub fn age_days(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - created.date_naive()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn age_uses_calendar_days() {
        let now = at(2024, 3, 10, 0, 1);
        assert_eq!(age_days(at(2024, 3, 9, 23, 59), now), 1);
        assert_eq!(age_days(at(2024, 3, 10, 0, 0), now), 0);
        assert_eq!(age_days(now - Duration::days(3), now), 3);
        assert_eq!(age_days(at(2024, 2, 28, 12, 0), now), 11);
    }

    #[test]
    fn within_deletes_recent_only() {
        let p = RetentionPolicy::default();
        assert!(p.should_delete(0));
        assert!(p.should_delete(1));
        assert!(!p.should_delete(2));
        assert!(!p.should_delete(3));
    }

    #[test]
    fn older_than_deletes_old_only() {
        let p = RetentionPolicy {
            threshold_days: 7,
            mode: RetentionMode::OlderThan,
        };
        assert!(!p.should_delete(0));
        assert!(!p.should_delete(6));
        assert!(p.should_delete(7));
        assert!(p.should_delete(30));
    }

    #[test]
    fn mode_parse() {
        assert_eq!(RetentionMode::parse("Within"), Some(RetentionMode::Within));
        assert_eq!(
            RetentionMode::parse("older_than"),
            Some(RetentionMode::OlderThan)
        );
        assert_eq!(RetentionMode::parse("newest"), None);
        assert_eq!(RetentionMode::OlderThan.as_str(), "older-than");
    }
}
