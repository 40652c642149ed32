use crate::{AlertPublisher, ComputeProvider, ProviderResult};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{ResourceType, TagSpecification};
use chrono::{DateTime, Utc};
use snapkeeper_common::{
    CreateImageRequest, Image, Instance, InstanceState, ProviderError, Snapshot, Tag,
};

const OWNER_SELF: &str = "self";

/// Maps an SDK failure onto our error type. Service errors carry a code;
/// anything without one (dispatch, timeout, credentials) is a transport error.
fn provider_error<E>(err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    match err.code() {
        Some(code) => ProviderError::api(code, err.message().unwrap_or_default()),
        None => ProviderError::Transport(format!("{:?}", err)),
    }
}

fn to_utc(ts: &aws_sdk_ec2::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

fn parse_creation_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn convert_tags(tags: &[aws_sdk_ec2::types::Tag]) -> Vec<Tag> {
    tags.iter()
        .filter_map(|t| Some(Tag::new(t.key()?, t.value().unwrap_or_default())))
        .collect()
}

fn convert_image(image: &aws_sdk_ec2::types::Image) -> Option<Image> {
    Some(Image {
        image_id: image.image_id()?.to_string(),
        owner_id: image.owner_id().map(str::to_string),
        name: image.name().map(str::to_string),
        created_at: image.creation_date().and_then(parse_creation_date),
        tags: convert_tags(image.tags()),
    })
}

/// Standard SDK retry (exponential backoff with jitter) capped at `max_attempts`.
fn retry_config(max_attempts: u32) -> RetryConfig {
    RetryConfig::standard().with_max_attempts(max_attempts.max(1))
}

/// EC2 backed compute provider. Credentials come from the SDK default chain;
/// throttled and transient calls are retried by the SDK client.
pub struct AwsProvider {
    ec2: aws_sdk_ec2::Client,
    region: String,
}

impl AwsProvider {
    pub async fn new(region: &str, max_attempts: u32) -> Self {
        let region = region.trim().to_string();
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .retry_config(retry_config(max_attempts))
            .load()
            .await;
        Self {
            ec2: aws_sdk_ec2::Client::new(&config),
            region,
        }
    }
}

#[async_trait]
impl ComputeProvider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    fn retries_internally(&self) -> bool {
        true
    }

    async fn list_instances(&self) -> ProviderResult<Vec<Instance>> {
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .ec2
                .describe_instances()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(provider_error)?;

            for reservation in resp.reservations() {
                for inst in reservation.instances() {
                    let Some(instance_id) = inst.instance_id() else {
                        continue;
                    };
                    let state = inst
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| InstanceState::parse(n.as_str()))
                        .unwrap_or_else(|| InstanceState::Unknown("unknown".to_string()));
                    out.push(Instance {
                        instance_id: instance_id.to_string(),
                        state,
                        tags: convert_tags(inst.tags()),
                        image_id: inst.image_id().map(str::to_string),
                    });
                }
            }

            match resp.next_token() {
                Some(t) if !t.is_empty() => next_token = Some(t.to_string()),
                _ => break,
            }
        }
        tracing::debug!(
            "[AWS API] DescribeInstances region={} -> {} instance(s)",
            self.region,
            out.len()
        );
        Ok(out)
    }

    async fn create_image(&self, request: &CreateImageRequest) -> ProviderResult<Option<String>> {
        let tags: Vec<aws_sdk_ec2::types::Tag> = request
            .tags
            .iter()
            .map(|t| {
                aws_sdk_ec2::types::Tag::builder()
                    .key(&t.key)
                    .value(&t.value)
                    .build()
            })
            .collect();
        let tag_spec = |resource_type: ResourceType| {
            TagSpecification::builder()
                .resource_type(resource_type)
                .set_tags(Some(tags.clone()))
                .build()
        };

        tracing::debug!(
            "[AWS API] CreateImage instance={} name={} no_reboot={}",
            request.instance_id,
            request.name,
            request.no_reboot
        );
        let resp = self
            .ec2
            .create_image()
            .instance_id(&request.instance_id)
            .name(&request.name)
            .description(&request.description)
            .no_reboot(request.no_reboot)
            .tag_specifications(tag_spec(ResourceType::Image))
            .tag_specifications(tag_spec(ResourceType::Snapshot))
            .send()
            .await
            .map_err(provider_error)?;

        Ok(resp.image_id().map(str::to_string))
    }

    async fn list_owned_images(&self) -> ProviderResult<Vec<Image>> {
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .ec2
                .describe_images()
                .owners(OWNER_SELF)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(provider_error)?;
            out.extend(resp.images().iter().filter_map(convert_image));
            match resp.next_token() {
                Some(t) if !t.is_empty() => next_token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn describe_image(&self, image_id: &str) -> ProviderResult<Image> {
        let resp = self
            .ec2
            .describe_images()
            .image_ids(image_id)
            .send()
            .await
            .map_err(provider_error)?;
        resp.images()
            .first()
            .and_then(convert_image)
            .ok_or_else(|| ProviderError::Missing(image_id.to_string()))
    }

    async fn deregister_image(&self, image_id: &str) -> ProviderResult<bool> {
        let resp = self
            .ec2
            .deregister_image()
            .image_id(image_id)
            .send()
            .await
            .map_err(provider_error)?;
        // Older API versions omit the flag; no error means it went through.
        Ok(resp.return_().unwrap_or(true))
    }

    async fn list_owned_snapshots(&self) -> ProviderResult<Vec<Snapshot>> {
        let mut out = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .ec2
                .describe_snapshots()
                .owner_ids(OWNER_SELF)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(provider_error)?;
            out.extend(resp.snapshots().iter().filter_map(|s| {
                Some(Snapshot {
                    snapshot_id: s.snapshot_id()?.to_string(),
                    started_at: s.start_time().and_then(to_utc),
                })
            }));
            match resp.next_token() {
                Some(t) if !t.is_empty() => next_token = Some(t.to_string()),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> ProviderResult<bool> {
        self.ec2
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(provider_error)?;
        Ok(true)
    }
}

/// SNS publisher. The topic may live in another region than the instances.
pub struct AwsNotifier {
    sns: aws_sdk_sns::Client,
}

impl AwsNotifier {
    /// `region` of None falls back to the SDK default region chain.
    pub async fn new(region: Option<&str>, max_attempts: u32) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .retry_config(retry_config(max_attempts));
        if let Some(r) = region {
            loader = loader.region(aws_config::Region::new(r.to_string()));
        }
        let config = loader.load().await;
        Self {
            sns: aws_sdk_sns::Client::new(&config),
        }
    }
}

#[async_trait]
impl AlertPublisher for AwsNotifier {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> ProviderResult<()> {
        self.sns
            .publish()
            .target_arn(topic)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(provider_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_date_parsing() {
        let d = parse_creation_date("2024-03-05T10:20:30.000Z").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-03-05T10:20:30+00:00");
        assert!(parse_creation_date("yesterday").is_none());
    }

    #[test]
    fn tags_without_key_are_dropped() {
        let tags = vec![
            aws_sdk_ec2::types::Tag::builder().key("Name").value("web1").build(),
            aws_sdk_ec2::types::Tag::builder().value("orphan").build(),
        ];
        assert_eq!(convert_tags(&tags), vec![Tag::new("Name", "web1")]);
    }

    #[test]
    fn retry_attempts_are_handed_to_the_sdk() {
        assert_eq!(retry_config(5).max_attempts(), 5);
        assert_eq!(retry_config(0).max_attempts(), 1);
    }
}
