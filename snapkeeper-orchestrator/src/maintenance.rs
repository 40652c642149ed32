use chrono::{DateTime, Utc};
use serde::Serialize;
use snapkeeper_common::actions::{ActionStatus, ActionType};
use snapkeeper_common::{Image, Instance, ProviderError, Snapshot};
use snapkeeper_providers::{AlertPublisher, ComputeProvider};
use tracing::Instrument;
use uuid::Uuid;

use crate::backup_job;
use crate::image_gc_job;
use crate::inventory;
use crate::logger;
use crate::notifier::Notifier;
use crate::retry::{with_retry, RetryPolicy};
use crate::settings::Settings;
use crate::snapshot_gc_job;
use crate::unused_images;

/// Everything a job step needs. Borrowed for the duration of one run.
pub struct JobContext<'a> {
    pub provider: &'a dyn ComputeProvider,
    pub notifier: &'a Notifier<'a>,
    pub settings: &'a Settings,
    /// `settings.retry`, or no retries when the provider client retries on its own.
    pub retry: RetryPolicy,
}

/// Summary of one invocation. Logged, never returned to the scheduler.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub instances_eligible: usize,
    pub images_created: usize,
    pub image_create_failures: usize,
    pub unused_images: usize,
    pub images_deleted: usize,
    pub images_retained: usize,
    pub image_delete_failures: usize,
    pub snapshots_deleted: usize,
    pub snapshots_in_use: usize,
    pub snapshots_retained: usize,
    pub snapshot_delete_failures: usize,
    /// Steps that could not run because a listing call failed.
    pub steps_skipped: Vec<&'static str>,
    pub warnings: Vec<&'static str>,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
}

async fn list_instances(ctx: &JobContext<'_>) -> Result<Vec<Instance>, ProviderError> {
    with_retry(&ctx.retry, "list_instances", || {
        ctx.provider.list_instances()
    })
    .await
}

async fn list_owned_images(ctx: &JobContext<'_>) -> Result<Vec<Image>, ProviderError> {
    with_retry(&ctx.retry, "list_owned_images", || {
        ctx.provider.list_owned_images()
    })
    .await
}

async fn list_owned_snapshots(ctx: &JobContext<'_>) -> Result<Vec<Snapshot>, ProviderError> {
    with_retry(&ctx.retry, "list_owned_snapshots", || {
        ctx.provider.list_owned_snapshots()
    })
    .await
}

async fn listing_failed(ctx: &JobContext<'_>, action: ActionType, what: &str, e: &ProviderError) {
    let msg = format!("{} exception occured while listing {}", e.code(), what);
    tracing::error!("❌ [maintenance] {}", msg);
    logger::log_quick(action, "", ActionStatus::Failed, Some(&e.to_string()));
    ctx.notifier.notify(&msg).await;
}

/// One maintenance pass: inventory, backup, unused-image cleanup, snapshot cleanup.
///
/// Every step lists fresh provider state. A failing listing skips only the step
/// that depends on it; item-level failures never stop the remaining items.
pub async fn run(
    provider: &dyn ComputeProvider,
    publisher: &dyn AlertPublisher,
    settings: &Settings,
    now: DateTime<Utc>,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("maintenance_run", %run_id, provider = provider.name());

    async move {
        let notifier = Notifier::new(publisher, &settings.alert_topic_arn, &settings.alert_subject);
        let retry = if provider.retries_internally() {
            RetryPolicy::none()
        } else {
            settings.retry
        };
        let ctx = JobContext {
            provider,
            notifier: &notifier,
            settings,
            retry,
        };
        let mut report = RunReport {
            run_id,
            ..Default::default()
        };

        // 1+2. Inventory and backup
        match list_instances(&ctx).await {
            Ok(instances) => {
                let summary = inventory::read_inventory(&instances, &settings.name_placeholder);
                report.instances_eligible = summary.eligible_count;
                report.warnings.extend(summary.warning);
                let backups = backup_job::create_backups(&ctx, &summary.labels, now).await;
                report.images_created = backups.created.len();
                report.image_create_failures = backups.failed;
            }
            Err(e) => {
                listing_failed(&ctx, ActionType::ListInstances, "instances", &e).await;
                report.steps_skipped.push("backup");
            }
        }

        // 3. Unused images; both listings are required to know what is safe to delete.
        let listings = match list_instances(&ctx).await {
            Ok(instances) => match list_owned_images(&ctx).await {
                Ok(images) => Some((instances, images)),
                Err(e) => {
                    listing_failed(&ctx, ActionType::ListImages, "images", &e).await;
                    None
                }
            },
            Err(e) => {
                listing_failed(&ctx, ActionType::ListInstances, "instances", &e).await;
                None
            }
        };
        match listings {
            Some((instances, images)) => {
                let referenced = unused_images::referenced_image_ids(
                    &instances,
                    settings.protect_stopping_images,
                );
                let owned = unused_images::owned_image_ids(&images);
                let unused = unused_images::unused_image_ids(&owned, &referenced);
                tracing::info!(
                    "🔍 [maintenance] {} owned image(s), {} referenced, {} unused",
                    owned.len(),
                    referenced.len(),
                    unused.len()
                );
                report.unused_images = unused.len();
                let gc = image_gc_job::cleanup_unused_images(&ctx, &unused, now).await;
                report.images_deleted = gc.deleted.len();
                report.images_retained = gc.retained;
                report.image_delete_failures = gc.failed;
            }
            None => report.steps_skipped.push("image-gc"),
        }

        // 4. Snapshots
        match list_owned_snapshots(&ctx).await {
            Ok(snapshots) => {
                let gc = snapshot_gc_job::cleanup_snapshots(&ctx, &snapshots, now).await;
                report.snapshots_deleted = gc.deleted.len();
                report.snapshots_in_use = gc.in_use;
                report.snapshots_retained = gc.retained;
                report.snapshot_delete_failures = gc.failed;
            }
            Err(e) => {
                listing_failed(&ctx, ActionType::ListSnapshots, "snapshots", &e).await;
                report.steps_skipped.push("snapshot-gc");
            }
        }

        report.alerts_sent = notifier.sent();
        report.alerts_failed = notifier.failed();
        report
    }
    .instrument(span)
    .await
}
