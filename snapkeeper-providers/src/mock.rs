use crate::{AlertPublisher, ComputeProvider, ProviderResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snapkeeper_common::{
    error::CODE_SNAPSHOT_IN_USE, CreateImageRequest, Image, Instance, InstanceState,
    ProviderError, Snapshot, Tag, NAME_TAG,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Provider calls that can be observed or have failures injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    ListInstances,
    CreateImage,
    ListImages,
    DescribeImage,
    DeregisterImage,
    ListSnapshots,
    DeleteSnapshot,
}

/// Outcome forced onto the next matching call.
#[derive(Debug, Clone)]
pub enum Injected {
    Error(ProviderError),
    NonSuccess,
}

#[derive(Default)]
struct MockState {
    instances: Vec<Instance>,
    images: BTreeMap<String, Image>,
    snapshots: BTreeMap<String, Snapshot>,
    // image id -> backing snapshot ids
    image_snapshots: HashMap<String, Vec<String>>,
    created: Vec<CreateImageRequest>,
    deregistered: Vec<String>,
    deleted_snapshots: Vec<String>,
    injected: HashMap<(MockCall, String), VecDeque<Injected>>,
    calls: HashMap<MockCall, usize>,
    next_id: u64,
}

impl MockState {
    fn record(&mut self, call: MockCall, resource_id: &str) -> Option<Injected> {
        *self.calls.entry(call).or_insert(0) += 1;
        self.injected
            .get_mut(&(call, resource_id.to_string()))
            .and_then(|q| q.pop_front())
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:017x}", prefix, self.next_id)
    }
}

/// In-memory compute provider. Images created through it are owned by "self"
/// and get one backing snapshot, which stays "in use" until the image is deregistered.
pub struct MockProvider {
    state: Mutex<MockState>,
    now: DateTime<Utc>,
    internal_retries: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_clock(Utc::now())
    }

    /// Creation timestamp stamped on images created through this provider.
    pub fn with_clock(now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            now,
            internal_retries: false,
        }
    }

    /// Behave like a client that retries on its own (as the SDK does).
    pub fn with_internal_retries(mut self) -> Self {
        self.internal_retries = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from the others.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_instance(&self, instance: Instance) {
        self.lock().instances.push(instance);
    }

    pub fn add_image(&self, image_id: &str, created_at: Option<DateTime<Utc>>) {
        self.lock().images.insert(
            image_id.to_string(),
            Image {
                image_id: image_id.to_string(),
                owner_id: Some("self".to_string()),
                name: Some(image_id.to_string()),
                created_at,
                tags: vec![],
            },
        );
    }

    pub fn add_snapshot(&self, snapshot_id: &str, started_at: Option<DateTime<Utc>>) {
        self.lock().snapshots.insert(
            snapshot_id.to_string(),
            Snapshot {
                snapshot_id: snapshot_id.to_string(),
                started_at,
            },
        );
    }

    /// Mark `snapshot_id` as backing `image_id`.
    pub fn link_snapshot(&self, image_id: &str, snapshot_id: &str) {
        self.lock()
            .image_snapshots
            .entry(image_id.to_string())
            .or_default()
            .push(snapshot_id.to_string());
    }

    /// Queue an outcome for the next `call` on `resource_id` (instance, image or
    /// snapshot id; empty for list calls).
    pub fn inject(&self, call: MockCall, resource_id: &str, outcome: Injected) {
        self.lock()
            .injected
            .entry((call, resource_id.to_string()))
            .or_default()
            .push_back(outcome);
    }

    pub fn fail(&self, call: MockCall, resource_id: &str, code: &str) {
        self.inject(
            call,
            resource_id,
            Injected::Error(ProviderError::api(code, format!("injected {}", code))),
        );
    }

    pub fn created_images(&self) -> Vec<CreateImageRequest> {
        self.lock().created.clone()
    }

    pub fn deregistered_images(&self) -> Vec<String> {
        self.lock().deregistered.clone()
    }

    pub fn deleted_snapshots(&self) -> Vec<String> {
        self.lock().deleted_snapshots.clone()
    }

    pub fn image_ids(&self) -> Vec<String> {
        self.lock().images.keys().cloned().collect()
    }

    pub fn snapshot_ids(&self) -> Vec<String> {
        self.lock().snapshots.keys().cloned().collect()
    }

    pub fn call_count(&self, call: MockCall) -> usize {
        self.lock().calls.get(&call).copied().unwrap_or(0)
    }
}

fn apply<T>(injected: Option<Injected>, non_success: T) -> Option<ProviderResult<T>> {
    match injected {
        Some(Injected::Error(e)) => Some(Err(e)),
        Some(Injected::NonSuccess) => Some(Ok(non_success)),
        None => None,
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn retries_internally(&self) -> bool {
        self.internal_retries
    }

    async fn list_instances(&self) -> ProviderResult<Vec<Instance>> {
        let mut st = self.lock();
        if let Some(Injected::Error(e)) = st.record(MockCall::ListInstances, "") {
            return Err(e);
        }
        Ok(st.instances.clone())
    }

    async fn create_image(&self, request: &CreateImageRequest) -> ProviderResult<Option<String>> {
        let mut st = self.lock();
        if let Some(r) = apply(st.record(MockCall::CreateImage, &request.instance_id), None) {
            return r;
        }
        let Some(instance) = st
            .instances
            .iter()
            .find(|i| i.instance_id == request.instance_id)
        else {
            return Err(ProviderError::api(
                "InvalidInstanceID.NotFound",
                format!("The instance ID '{}' does not exist", request.instance_id),
            ));
        };
        if !instance.state.is_backup_eligible() {
            return Err(ProviderError::api(
                snapkeeper_common::error::CODE_INVALID_PARAMETER_VALUE,
                format!("Instance '{}' is not in a valid state", request.instance_id),
            ));
        }
        if st
            .images
            .values()
            .any(|i| i.name.as_deref() == Some(request.name.as_str()))
        {
            return Err(ProviderError::api(
                "InvalidAMIName.Duplicate",
                format!("AMI name {} is already in use", request.name),
            ));
        }

        let image_id = st.fresh_id("ami");
        let snapshot_id = st.fresh_id("snap");
        st.images.insert(
            image_id.clone(),
            Image {
                image_id: image_id.clone(),
                owner_id: Some("self".to_string()),
                name: Some(request.name.clone()),
                created_at: Some(self.now),
                tags: request.tags.clone(),
            },
        );
        st.snapshots.insert(
            snapshot_id.clone(),
            Snapshot {
                snapshot_id: snapshot_id.clone(),
                started_at: Some(self.now),
            },
        );
        st.image_snapshots
            .insert(image_id.clone(), vec![snapshot_id]);
        st.created.push(request.clone());
        Ok(Some(image_id))
    }

    async fn list_owned_images(&self) -> ProviderResult<Vec<Image>> {
        let mut st = self.lock();
        if let Some(Injected::Error(e)) = st.record(MockCall::ListImages, "") {
            return Err(e);
        }
        Ok(st.images.values().cloned().collect())
    }

    async fn describe_image(&self, image_id: &str) -> ProviderResult<Image> {
        let mut st = self.lock();
        if let Some(Injected::Error(e)) = st.record(MockCall::DescribeImage, image_id) {
            return Err(e);
        }
        st.images
            .get(image_id)
            .cloned()
            .ok_or_else(|| ProviderError::Missing(image_id.to_string()))
    }

    async fn deregister_image(&self, image_id: &str) -> ProviderResult<bool> {
        let mut st = self.lock();
        if let Some(r) = apply(st.record(MockCall::DeregisterImage, image_id), false) {
            return r;
        }
        if st.images.remove(image_id).is_none() {
            return Err(ProviderError::api(
                "InvalidAMIID.NotFound",
                format!("The image id '[{}]' does not exist", image_id),
            ));
        }
        st.image_snapshots.remove(image_id);
        st.deregistered.push(image_id.to_string());
        Ok(true)
    }

    async fn list_owned_snapshots(&self) -> ProviderResult<Vec<Snapshot>> {
        let mut st = self.lock();
        if let Some(Injected::Error(e)) = st.record(MockCall::ListSnapshots, "") {
            return Err(e);
        }
        Ok(st.snapshots.values().cloned().collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> ProviderResult<bool> {
        let mut st = self.lock();
        if let Some(r) = apply(st.record(MockCall::DeleteSnapshot, snapshot_id), false) {
            return r;
        }
        if let Some((image_id, _)) = st
            .image_snapshots
            .iter()
            .find(|(_, snaps)| snaps.iter().any(|s| s == snapshot_id))
        {
            return Err(ProviderError::api(
                CODE_SNAPSHOT_IN_USE,
                format!(
                    "The snapshot {} is currently in use by {}",
                    snapshot_id, image_id
                ),
            ));
        }
        if st.snapshots.remove(snapshot_id).is_none() {
            return Err(ProviderError::api(
                "InvalidSnapshot.NotFound",
                format!("The snapshot '{}' does not exist.", snapshot_id),
            ));
        }
        st.deleted_snapshots.push(snapshot_id.to_string());
        Ok(true)
    }
}

/// Records published alerts; can be told to fail publishing.
#[derive(Default)]
pub struct MockNotifier {
    messages: Mutex<Vec<(String, String, String)>>,
    failure: Mutex<Option<ProviderError>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            messages: Mutex::new(vec![]),
            failure: Mutex::new(Some(error)),
        }
    }

    /// (topic, subject, message) triples in publish order, failed attempts included.
    pub fn published(&self) -> Vec<(String, String, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn messages(&self) -> Vec<String> {
        self.published().into_iter().map(|(_, _, m)| m).collect()
    }
}

#[async_trait]
impl AlertPublisher for MockNotifier {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> ProviderResult<()> {
        self.messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((topic.to_string(), subject.to_string(), message.to_string()));
        match self.failure.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Convenience constructor for test fixtures.
pub fn instance(
    instance_id: &str,
    state: InstanceState,
    name: Option<&str>,
    image_id: Option<&str>,
) -> Instance {
    Instance {
        instance_id: instance_id.to_string(),
        state,
        tags: name
            .map(|n| vec![Tag::new(NAME_TAG, n)])
            .unwrap_or_default(),
        image_id: image_id.map(|s| s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(instance_id: &str, name: &str) -> CreateImageRequest {
        CreateImageRequest {
            instance_id: instance_id.to_string(),
            name: name.to_string(),
            description: format!("This is ami for {}", instance_id),
            no_reboot: true,
            tags: vec![Tag::new(NAME_TAG, "web1")],
        }
    }

    #[tokio::test]
    async fn create_image_registers_image_and_snapshot() {
        let p = MockProvider::new();
        p.add_instance(instance("i-1", InstanceState::Running, Some("web1"), None));

        let id = p.create_image(&request("i-1", "web1_x")).await.unwrap();
        let id = id.expect("image id");
        assert_eq!(p.image_ids(), vec![id.clone()]);
        assert_eq!(p.snapshot_ids().len(), 1);

        // Backing snapshot is in use until the image is gone.
        let snap = p.snapshot_ids()[0].clone();
        let err = p.delete_snapshot(&snap).await.unwrap_err();
        assert!(err.is_code(CODE_SNAPSHOT_IN_USE));
        assert!(p.deregister_image(&id).await.unwrap());
        assert!(p.delete_snapshot(&snap).await.unwrap());
    }

    #[tokio::test]
    async fn create_image_rejects_terminated_and_duplicates() {
        let p = MockProvider::new();
        p.add_instance(instance("i-1", InstanceState::Running, Some("web1"), None));
        p.add_instance(instance("i-2", InstanceState::Terminated, None, None));

        let err = p.create_image(&request("i-2", "x")).await.unwrap_err();
        assert_eq!(err.code(), "InvalidParameterValue");

        p.create_image(&request("i-1", "dup")).await.unwrap();
        let err = p.create_image(&request("i-1", "dup")).await.unwrap_err();
        assert_eq!(err.code(), "InvalidAMIName.Duplicate");
    }

    #[tokio::test]
    async fn injected_outcomes_are_consumed_in_order() {
        let p = MockProvider::new();
        p.add_image("ami-1", None);
        p.inject(MockCall::DeregisterImage, "ami-1", Injected::NonSuccess);
        p.fail(MockCall::DeregisterImage, "ami-1", "RequestLimitExceeded");

        assert!(!p.deregister_image("ami-1").await.unwrap());
        assert!(p.deregister_image("ami-1").await.is_err());
        assert!(p.deregister_image("ami-1").await.unwrap());
        assert_eq!(p.call_count(MockCall::DeregisterImage), 3);
        assert_eq!(p.deregistered_images(), vec!["ami-1".to_string()]);
    }

    #[tokio::test]
    async fn notifier_records_even_when_failing() {
        let n = MockNotifier::failing(ProviderError::api("AuthorizationError", "denied"));
        assert!(n.publish("topic", "subj", "body").await.is_err());
        assert_eq!(n.messages(), vec!["body".to_string()]);
    }
}
