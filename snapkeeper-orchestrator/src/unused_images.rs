use snapkeeper_common::{Image, Instance, InstanceState};
use std::collections::{BTreeSet, HashSet};

/// Image ids referenced by live instances. Live means running or stopped;
/// stopping instances are only included when `protect_stopping` is set.
pub fn referenced_image_ids(instances: &[Instance], protect_stopping: bool) -> HashSet<String> {
    instances
        .iter()
        .filter(|i| match i.state {
            InstanceState::Running | InstanceState::Stopped => true,
            InstanceState::Stopping => protect_stopping,
            _ => false,
        })
        .filter_map(|i| i.image_id.clone())
        .collect()
}

pub fn owned_image_ids(images: &[Image]) -> HashSet<String> {
    images.iter().map(|i| i.image_id.clone()).collect()
}

/// `owned - referenced`, ordered for stable processing.
pub fn unused_image_ids(owned: &HashSet<String>, referenced: &HashSet<String>) -> BTreeSet<String> {
    owned.difference(referenced).cloned().collect()
}
