// -----------------------------------------------------------------------------
// Alerting
// -----------------------------------------------------------------------------

pub const DEFAULT_ALERT_TOPIC_ARN: &str = "arn:aws:sns:us-east-1:814109103016:Failed_AMI_Tasks";
pub const DEFAULT_ALERT_SUBJECT: &str = "Issue Creating or Deleting AMI";

// -----------------------------------------------------------------------------
// Action types (ACT:*) recorded by the action logger
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    ListInstances,
    CreateImage,
    ListImages,
    DescribeImage,
    DeregisterImage,
    ListSnapshots,
    DeleteSnapshot,
    PublishAlert,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ListInstances => "ACT:LIST_INSTANCES",
            ActionType::CreateImage => "ACT:CREATE_IMAGE",
            ActionType::ListImages => "ACT:LIST_IMAGES",
            ActionType::DescribeImage => "ACT:DESCRIBE_IMAGE",
            ActionType::DeregisterImage => "ACT:DEREGISTER_IMAGE",
            ActionType::ListSnapshots => "ACT:LIST_SNAPSHOTS",
            ActionType::DeleteSnapshot => "ACT:DELETE_SNAPSHOT",
            ActionType::PublishAlert => "ACT:PUBLISH_ALERT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Success,
    Failed,
    Skipped,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
            ActionStatus::Skipped => "skipped",
        }
    }
}
