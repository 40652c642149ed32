use chrono::{DateTime, Utc};
use snapkeeper_common::actions::{ActionStatus, ActionType};
use snapkeeper_common::error::CODE_SNAPSHOT_IN_USE;
use snapkeeper_common::Snapshot;

use crate::logger;
use crate::maintenance::JobContext;
use crate::retention::age_days;
use crate::retry::with_retry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotGcOutcome {
    pub deleted: Vec<String>,
    pub in_use: usize,
    pub retained: usize,
    pub failed: usize,
}

/// job-snapshot-gc: deletes owned snapshots the retention policy selects.
///
/// Snapshots still backing an image (or a volume) are skipped quietly. Other
/// errors are logged, and only alerted when `notify_snapshot_errors` is set.
pub async fn cleanup_snapshots(
    ctx: &JobContext<'_>,
    snapshots: &[Snapshot],
    now: DateTime<Utc>,
) -> SnapshotGcOutcome {
    let mut outcome = SnapshotGcOutcome::default();
    if snapshots.is_empty() {
        tracing::info!("[job-snapshot-gc] No EBS snapshots were found");
        return outcome;
    }

    let policy = ctx.settings.retention;
    for snapshot in snapshots {
        let snapshot_id = snapshot.snapshot_id.as_str();
        let Some(started_at) = snapshot.started_at else {
            tracing::warn!(
                "⚠️ [job-snapshot-gc] snapshot {} has no start time, keeping it",
                snapshot_id
            );
            outcome.retained += 1;
            continue;
        };
        let age = age_days(started_at, now);
        if !policy.should_delete(age) {
            outcome.retained += 1;
            continue;
        }

        let log = logger::log_event_with_metadata(
            ActionType::DeleteSnapshot,
            snapshot_id,
            Some(serde_json::json!({"age_days": age})),
        );
        match with_retry(&ctx.retry, "delete_snapshot", || {
            ctx.provider.delete_snapshot(snapshot_id)
        })
        .await
        {
            Ok(true) => {
                tracing::info!("🧹 [job-snapshot-gc] Deleted snapshot: {}", snapshot_id);
                log.complete(ActionStatus::Success, None);
                outcome.deleted.push(snapshot_id.to_string());
            }
            Ok(false) => {
                let msg = format!("Snapshot {} was not deleted successfully", snapshot_id);
                tracing::error!("❌ [job-snapshot-gc] {}", msg);
                log.complete(ActionStatus::Failed, Some("Provider returned non-success"));
                if ctx.settings.notify_snapshot_errors {
                    ctx.notifier.notify(&msg).await;
                }
                outcome.failed += 1;
            }
            Err(e) if e.is_code(CODE_SNAPSHOT_IN_USE) => {
                tracing::info!(
                    "[job-snapshot-gc] Skipped this snapshot which is in use: {}",
                    snapshot_id
                );
                log.complete(ActionStatus::Skipped, Some(&e.to_string()));
                outcome.in_use += 1;
            }
            Err(e) => {
                let msg = format!(
                    "{} exception error occured while deleting {}",
                    e.code(),
                    snapshot_id
                );
                tracing::error!("❌ [job-snapshot-gc] {}", msg);
                log.complete(ActionStatus::Failed, Some(&e.to_string()));
                if ctx.settings.notify_snapshot_errors {
                    ctx.notifier.notify(&msg).await;
                }
                outcome.failed += 1;
            }
        }
    }

    outcome
}
