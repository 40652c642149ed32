use chrono::{DateTime, Utc};
use snapkeeper_common::actions::{ActionStatus, ActionType};
use std::collections::BTreeSet;

use crate::logger;
use crate::maintenance::JobContext;
use crate::retention::age_days;
use crate::retry::with_retry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageGcOutcome {
    pub deleted: Vec<String>,
    pub retained: usize,
    pub failed: usize,
}

/// job-image-gc: deregisters unused images the retention policy selects.
/// Each candidate is handled independently; errors are logged and alerted.
pub async fn cleanup_unused_images(
    ctx: &JobContext<'_>,
    unused: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> ImageGcOutcome {
    let mut outcome = ImageGcOutcome::default();
    let policy = ctx.settings.retention;

    for image_id in unused {
        let image = match with_retry(&ctx.retry, "describe_image", || {
            ctx.provider.describe_image(image_id)
        })
        .await
        {
            Ok(image) => image,
            Err(e) => {
                let msg = format!(
                    "{} exception occured while describing ami: {}",
                    e.code(),
                    image_id
                );
                tracing::error!("❌ [job-image-gc] {}", msg);
                logger::log_quick(
                    ActionType::DescribeImage,
                    image_id,
                    ActionStatus::Failed,
                    Some(&e.to_string()),
                );
                ctx.notifier.notify(&msg).await;
                outcome.failed += 1;
                continue;
            }
        };

        let Some(created_at) = image.created_at else {
            tracing::warn!(
                "⚠️ [job-image-gc] ami {} has no creation date, keeping it",
                image_id
            );
            outcome.retained += 1;
            continue;
        };

        let age = age_days(created_at, now);
        if !policy.should_delete(age) {
            tracing::debug!(
                "[job-image-gc] keeping ami {} (age {}d, threshold {}d, mode {})",
                image_id,
                age,
                policy.threshold_days,
                policy.mode.as_str()
            );
            outcome.retained += 1;
            continue;
        }

        let log = logger::log_event_with_metadata(
            ActionType::DeregisterImage,
            image_id,
            Some(serde_json::json!({"age_days": age})),
        );
        match with_retry(&ctx.retry, "deregister_image", || {
            ctx.provider.deregister_image(image_id)
        })
        .await
        {
            Ok(true) => {
                tracing::info!("🧹 [job-image-gc] Deleted ami: {}", image_id);
                log.complete(ActionStatus::Success, None);
                outcome.deleted.push(image_id.clone());
            }
            Ok(false) => {
                let msg = format!("Ami: {} was not successfully deleted", image_id);
                tracing::error!("❌ [job-image-gc] {}", msg);
                log.complete(ActionStatus::Failed, Some("Provider returned non-success"));
                ctx.notifier.notify(&msg).await;
                outcome.failed += 1;
            }
            Err(e) => {
                let msg = format!(
                    "{} exception occured while deleting ami: {}",
                    e.code(),
                    image_id
                );
                tracing::error!("❌ [job-image-gc] {}", msg);
                log.complete(ActionStatus::Failed, Some(&e.to_string()));
                ctx.notifier.notify(&msg).await;
                outcome.failed += 1;
            }
        }
    }

    outcome
}
