use async_trait::async_trait;
use snapkeeper_common::{CreateImageRequest, Image, Instance, ProviderError, Snapshot};

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Compute API surface the maintenance job needs.
///
/// Mutating calls return `Ok(false)` / `Ok(None)` when the provider accepted the
/// request but did not report success, and `Err` when it rejected it outright.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Provider code used in logs ("aws", "mock").
    fn name(&self) -> &str;

    /// True when the client already retries throttled and transient calls itself.
    fn retries_internally(&self) -> bool {
        false
    }

    async fn list_instances(&self) -> ProviderResult<Vec<Instance>>;

    /// Returns the new image id, or None on a non-success response.
    async fn create_image(&self, request: &CreateImageRequest) -> ProviderResult<Option<String>>;

    /// Images owned by the calling account.
    async fn list_owned_images(&self) -> ProviderResult<Vec<Image>>;

    async fn describe_image(&self, image_id: &str) -> ProviderResult<Image>;

    async fn deregister_image(&self, image_id: &str) -> ProviderResult<bool>;

    /// Storage snapshots owned by the calling account.
    async fn list_owned_snapshots(&self) -> ProviderResult<Vec<Snapshot>>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> ProviderResult<bool>;
}

/// Fire-and-forget alert channel (SNS topic or equivalent).
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> ProviderResult<()>;
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "aws")]
pub mod aws;
