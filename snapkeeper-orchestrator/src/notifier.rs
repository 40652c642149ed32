use snapkeeper_common::actions::{ActionStatus, ActionType};
use snapkeeper_providers::AlertPublisher;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::logger;

/// Terminal error sink: forwards alert bodies to the configured topic.
/// Publish failures are logged and swallowed.
pub struct Notifier<'a> {
    publisher: &'a dyn AlertPublisher,
    topic: String,
    subject: String,
    sent: AtomicUsize,
    failed: AtomicUsize,
}

impl<'a> Notifier<'a> {
    pub fn new(publisher: &'a dyn AlertPublisher, topic: &str, subject: &str) -> Self {
        Self {
            publisher,
            topic: topic.to_string(),
            subject: subject.to_string(),
            sent: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Returns true when the alert was accepted by the channel.
    pub async fn notify(&self, message: &str) -> bool {
        let log = logger::log_event(ActionType::PublishAlert, &self.topic);
        match self
            .publisher
            .publish(&self.topic, &self.subject, message)
            .await
        {
            Ok(()) => {
                log.complete(ActionStatus::Success, None);
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                tracing::error!(
                    "{} exception occured while publishing SNS notification",
                    e.code()
                );
                log.complete(ActionStatus::Failed, Some(&e.to_string()));
                self.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Region segment of an ARN (`arn:partition:service:region:account:resource`).
pub fn topic_region(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    if parts.next()? != "arn" {
        return None;
    }
    parts.nth(2).filter(|r| !r.is_empty())
}
