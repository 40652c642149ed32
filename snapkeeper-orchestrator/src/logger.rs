use snapkeeper_common::actions::{ActionStatus, ActionType};
use std::time::Instant;
use uuid::Uuid;

/// An in-flight provider action. Emits one structured event when started and
/// one when completed, both carrying the same `log_id`.
#[derive(Debug)]
pub struct ActionLog {
    pub log_id: Uuid,
    action: ActionType,
    resource_id: String,
    started: Instant,
}

/// Start an action log for a provider call on `resource_id`.
pub fn log_event(action: ActionType, resource_id: &str) -> ActionLog {
    log_event_with_metadata(action, resource_id, None)
}

/// Start an action log with metadata (context info)
pub fn log_event_with_metadata(
    action: ActionType,
    resource_id: &str,
    metadata: Option<serde_json::Value>,
) -> ActionLog {
    let log_id = Uuid::new_v4();
    tracing::debug!(
        log_id = %log_id,
        action_type = action.as_str(),
        resource_id,
        metadata = %metadata.unwrap_or(serde_json::Value::Null),
        status = "in_progress",
        "📝 action started"
    );
    ActionLog {
        log_id,
        action,
        resource_id: resource_id.to_string(),
        started: Instant::now(),
    }
}

impl ActionLog {
    /// Log completion with duration.
    pub fn complete(self, status: ActionStatus, error_message: Option<&str>) {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        match status {
            ActionStatus::Failed => tracing::warn!(
                log_id = %self.log_id,
                action_type = self.action.as_str(),
                resource_id = %self.resource_id,
                status = status.as_str(),
                duration_ms,
                error_message = error_message.unwrap_or(""),
                "📝 action completed"
            ),
            _ => tracing::info!(
                log_id = %self.log_id,
                action_type = self.action.as_str(),
                resource_id = %self.resource_id,
                status = status.as_str(),
                duration_ms,
                "📝 action completed"
            ),
        }
    }
}

/// Quick log for one-off events (skips, no-ops).
pub fn log_quick(action: ActionType, resource_id: &str, status: ActionStatus, details: Option<&str>) {
    log_event(action, resource_id).complete(status, details);
}
