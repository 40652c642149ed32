use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod actions;
pub mod error;

pub use error::ProviderError;

/// Tag key used to label instances, images and snapshots.
pub const NAME_TAG: &str = "Name";

// --- Enums ---

/// Provider lifecycle state of an instance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    /// Anything the provider reports that we don't model explicitly.
    Unknown(String),
}

impl InstanceState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            other => InstanceState::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Unknown(s) => s.as_str(),
        }
    }

    /// States from which an image can be taken (running, stopped, stopping).
    pub fn is_backup_eligible(&self) -> bool {
        matches!(
            self,
            InstanceState::Running | InstanceState::Stopped | InstanceState::Stopping
        )
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Entities ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Instance {
    pub instance_id: String,
    pub state: InstanceState,
    pub tags: Vec<Tag>,
    pub image_id: Option<String>, // None when not launched from an image
}

impl Instance {
    /// Value of the `Name` tag, ignoring blank values.
    pub fn name_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == NAME_TAG)
            .map(|t| t.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Image {
    pub image_id: String,
    pub owner_id: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub started_at: Option<DateTime<Utc>>,
}

/// Request payload for an image backup of one instance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CreateImageRequest {
    pub instance_id: String,
    pub name: String,
    pub description: String,
    pub no_reboot: bool,
    /// Tags applied to both the image and the snapshot(s) backing it.
    pub tags: Vec<Tag>,
}
