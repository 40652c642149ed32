use snapkeeper_common::Instance;
use std::collections::BTreeMap;

pub const NO_ELIGIBLE_INSTANCES_WARNING: &str =
    "There are no instances running or stopped to generate amis/images. No AMIs will be generated";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySummary {
    /// Instances in running, stopped or stopping state.
    pub eligible_count: usize,
    /// instance id -> backup label, for eligible instances only.
    pub labels: BTreeMap<String, String>,
    /// Operator-facing warning logged for this listing, if any.
    pub warning: Option<&'static str>,
}

/// Reads one instance listing into backup labels. Instances without a usable
/// `Name` tag get `placeholder`.
pub fn read_inventory(instances: &[Instance], placeholder: &str) -> InventorySummary {
    let labels: BTreeMap<String, String> = instances
        .iter()
        .filter(|i| i.state.is_backup_eligible())
        .map(|i| {
            let label = i.name_tag().unwrap_or(placeholder);
            (i.instance_id.clone(), label.to_string())
        })
        .collect();

    let mut summary = InventorySummary {
        eligible_count: labels.len(),
        labels,
        warning: None,
    };
    if summary.eligible_count == 0 {
        summary.warning = Some(NO_ELIGIBLE_INSTANCES_WARNING);
        tracing::warn!("⚠️ [inventory] {}", NO_ELIGIBLE_INSTANCES_WARNING);
    } else {
        tracing::info!(
            "🔍 [inventory] {} of {} instance(s) eligible for backup",
            summary.eligible_count,
            instances.len()
        );
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapkeeper_common::{InstanceState, Tag};
    use snapkeeper_providers::mock::instance;

    #[test]
    fn no_eligible_instances() {
        let listing = vec![
            instance("i-1", InstanceState::Terminated, Some("old"), None),
            instance("i-2", InstanceState::Pending, Some("new"), None),
        ];
        let s = read_inventory(&listing, "random");
        assert_eq!(s.eligible_count, 0);
        assert!(s.labels.is_empty());
        assert_eq!(s.warning, Some(NO_ELIGIBLE_INSTANCES_WARNING));
        assert_eq!(
            read_inventory(&[], "random").warning,
            Some(NO_ELIGIBLE_INSTANCES_WARNING)
        );
    }

    #[test]
    fn stopping_counts_as_eligible() {
        let listing = vec![
            instance("i-1", InstanceState::Running, Some("web1"), None),
            instance("i-2", InstanceState::Stopped, Some("db1"), None),
            instance("i-3", InstanceState::Stopping, Some("batch"), None),
            instance("i-4", InstanceState::ShuttingDown, Some("gone"), None),
        ];
        let s = read_inventory(&listing, "random");
        assert_eq!(s.eligible_count, 3);
        assert_eq!(
            s.labels.keys().cloned().collect::<Vec<_>>(),
            vec!["i-1", "i-2", "i-3"]
        );
        assert_eq!(s.labels["i-3"], "batch");
        assert_eq!(s.warning, None);
    }

    #[test]
    fn missing_or_blank_name_gets_placeholder() {
        let mut other_tags = instance("i-2", InstanceState::Running, None, None);
        other_tags.tags = vec![Tag::new("env", "prod"), Tag::new("team", "ops")];
        let mut blank = instance("i-3", InstanceState::Running, None, None);
        blank.tags = vec![Tag::new("Name", "")];
        // Name tag must win regardless of where it appears among the tags.
        let mut name_first = instance("i-4", InstanceState::Running, None, None);
        name_first.tags = vec![Tag::new("Name", "api"), Tag::new("env", "prod")];

        let listing = vec![
            instance("i-1", InstanceState::Running, None, None),
            other_tags,
            blank,
            name_first,
        ];
        let s = read_inventory(&listing, "random");
        assert_eq!(s.labels["i-1"], "random");
        assert_eq!(s.labels["i-2"], "random");
        assert_eq!(s.labels["i-3"], "random");
        assert_eq!(s.labels["i-4"], "api");
        assert!(s.labels.values().all(|l| !l.is_empty()));
    }
}
