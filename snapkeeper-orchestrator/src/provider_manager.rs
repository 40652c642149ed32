use anyhow::{bail, Result};
use snapkeeper_providers::{AlertPublisher, ComputeProvider};

use crate::settings::Settings;

pub struct ProviderManager;

impl ProviderManager {
    pub fn available_providers() -> Vec<&'static str> {
        let mut out = Vec::new();
        #[cfg(feature = "provider-aws")]
        out.push("aws");
        #[cfg(feature = "provider-mock")]
        out.push("mock");
        out
    }

    /// Compute provider and alert channel for `settings.provider`.
    pub async fn get_provider(
        settings: &Settings,
    ) -> Result<(Box<dyn ComputeProvider>, Box<dyn AlertPublisher>)> {
        match settings.provider.as_str() {
            #[cfg(feature = "provider-aws")]
            "aws" => {
                use snapkeeper_providers::aws::{AwsNotifier, AwsProvider};
                let max_attempts = settings.retry.max_attempts;
                let provider = AwsProvider::new(&settings.region, max_attempts).await;
                // The topic can live in a different region than the instances.
                let topic_region = crate::notifier::topic_region(&settings.alert_topic_arn);
                let notifier = AwsNotifier::new(topic_region, max_attempts).await;
                Ok((Box::new(provider), Box::new(notifier)))
            }
            #[cfg(feature = "provider-mock")]
            "mock" => {
                use snapkeeper_providers::mock::{MockNotifier, MockProvider};
                Ok((Box::new(MockProvider::new()), Box::new(MockNotifier::new())))
            }
            // Add other providers here
            other => bail!(
                "unknown or disabled provider {:?} (available: {:?})",
                other,
                Self::available_providers()
            ),
        }
    }
}
