use chrono::{DateTime, Utc};
use snapkeeper_common::actions::{ActionStatus, ActionType};
use snapkeeper_common::error::CODE_INVALID_PARAMETER_VALUE;
use snapkeeper_common::{CreateImageRequest, ProviderError, Tag, NAME_TAG};
use std::collections::BTreeMap;

use crate::logger;
use crate::maintenance::JobContext;
use crate::retry::with_retry_if;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOutcome {
    pub created: Vec<String>,
    pub failed: usize,
}

/// `_YYYY-MM-DD-HH_MM_SS`; sorts chronologically and is unique per second.
pub fn timestamp_suffix(now: DateTime<Utc>) -> String {
    now.format("_%Y-%m-%d-%H_%M_%S").to_string()
}

pub fn image_name(label: &str, now: DateTime<Utc>) -> String {
    format!("{}{}", label, timestamp_suffix(now))
}

pub fn build_request(instance_id: &str, label: &str, now: DateTime<Utc>) -> CreateImageRequest {
    CreateImageRequest {
        instance_id: instance_id.to_string(),
        name: image_name(label, now),
        description: format!("This is ami for {}", instance_id),
        no_reboot: true,
        tags: vec![Tag::new(NAME_TAG, label)],
    }
}

/// job-backup: requests one image per (instance, label). Every instance is
/// attempted; failures are logged and alerted, never propagated.
pub async fn create_backups(
    ctx: &JobContext<'_>,
    labels: &BTreeMap<String, String>,
    now: DateTime<Utc>,
) -> BackupOutcome {
    let mut outcome = BackupOutcome::default();

    for (instance_id, label) in labels {
        let request = build_request(instance_id, label, now);
        let log = logger::log_event_with_metadata(
            ActionType::CreateImage,
            instance_id,
            Some(serde_json::json!({"name": request.name, "label": label})),
        );

        let res = with_retry_if(
            &ctx.retry,
            "create_image",
            ProviderError::is_throttling,
            || ctx.provider.create_image(&request),
        )
        .await;

        match res {
            Ok(Some(image_id)) => {
                tracing::info!("📸 [job-backup] Created ami: {}", image_id);
                log.complete(ActionStatus::Success, None);
                outcome.created.push(image_id);
            }
            Ok(None) => {
                let msg = format!("Issue creating ami from instance {}", instance_id);
                tracing::error!("❌ [job-backup] {}", msg);
                log.complete(ActionStatus::Failed, Some("Provider returned non-success"));
                ctx.notifier.notify(&msg).await;
                outcome.failed += 1;
            }
            Err(e) if e.is_code(CODE_INVALID_PARAMETER_VALUE) => {
                let msg = format!(
                    "{} is not in a 'running' or 'stopping' or 'stopped' state",
                    instance_id
                );
                tracing::error!("❌ [job-backup] {}", msg);
                log.complete(ActionStatus::Failed, Some(&e.to_string()));
                ctx.notifier.notify(&msg).await;
                outcome.failed += 1;
            }
            Err(e) => {
                tracing::error!(
                    "❌ [job-backup] {} exception error occured while creating an image from instance: {}",
                    e.code(),
                    instance_id
                );
                log.complete(ActionStatus::Failed, Some(&e.to_string()));
                ctx.notifier.notify(e.code()).await;
                outcome.failed += 1;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn is_timestamp_suffix(s: &str) -> bool {
        // _YYYY-MM-DD-HH_MM_SS
        let b = s.as_bytes();
        b.len() == 20
            && b[0] == b'_'
            && [5, 8, 11].iter().all(|&i| b[i] == b'-')
            && [14, 17].iter().all(|&i| b[i] == b'_')
            && [1, 2, 3, 4, 6, 7, 9, 10, 12, 13, 15, 16, 18, 19]
                .iter()
                .all(|&i| b[i].is_ascii_digit())
    }

    #[test]
    fn name_carries_sortable_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(timestamp_suffix(now), "_2024-03-05-07_08_09");
        assert_eq!(image_name("web1", now), "web1_2024-03-05-07_08_09");
        assert!(is_timestamp_suffix(&timestamp_suffix(Utc::now())));
    }

    #[test]
    fn names_one_second_apart_differ() {
        let t = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let a = image_name("db1", t);
        let b = image_name("db1", t + chrono::Duration::seconds(1));
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn request_tags_image_with_label() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let r = build_request("i-0abc", "web1", now);
        assert_eq!(r.description, "This is ami for i-0abc");
        assert!(r.no_reboot);
        assert_eq!(r.tags, vec![Tag::new("Name", "web1")]);
        assert!(r.name.starts_with("web1_"));
        assert!(is_timestamp_suffix(&r.name["web1".len()..]));
    }
}
