use thiserror::Error;

/// Error code returned when an instance is not in a state that allows imaging.
pub const CODE_INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";
/// Error code returned when a snapshot is still referenced (by an image or a volume).
pub const CODE_SNAPSHOT_IN_USE: &str = "InvalidSnapshot.InUse";

// Codes the provider uses for rate limiting; safe to retry.
const THROTTLING_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "ThrottlingException",
    "ServiceUnavailable",
    "InternalError",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider rejected the request with a structured error code.
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    /// Request went through but the provider did not report success.
    #[error("provider returned non-success: {0}")]
    NonSuccess(String),

    /// Connection, timeout, credentials or response parsing failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Resource looked up by id does not exist (or lacks the requested field).
    #[error("not found: {0}")]
    Missing(String),
}

impl ProviderError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Short code suitable for log lines and alert bodies.
    pub fn code(&self) -> &str {
        match self {
            ProviderError::Api { code, .. } => code,
            ProviderError::NonSuccess(_) => "NonSuccess",
            ProviderError::Transport(_) => "TransportError",
            ProviderError::Missing(_) => "NotFound",
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        matches!(self, ProviderError::Api { code: c, .. } if c == code)
    }

    /// The provider refused the request before acting on it.
    pub fn is_throttling(&self) -> bool {
        matches!(self, ProviderError::Api { code, .. } if THROTTLING_CODES.contains(&code.as_str()))
    }

    /// Throttling, or a transport failure where the request may or may not have landed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_)) || self.is_throttling()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        let e = ProviderError::api(CODE_SNAPSHOT_IN_USE, "snap-1 is in use by ami-1");
        assert_eq!(e.code(), "InvalidSnapshot.InUse");
        assert!(e.is_code(CODE_SNAPSHOT_IN_USE));
        assert!(!e.is_code(CODE_INVALID_PARAMETER_VALUE));
        assert_eq!(
            ProviderError::Transport("timeout".into()).code(),
            "TransportError"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(ProviderError::api("RequestLimitExceeded", "slow down").is_transient());
        assert!(!ProviderError::api(CODE_INVALID_PARAMETER_VALUE, "bad").is_transient());
        assert!(!ProviderError::NonSuccess("500".into()).is_transient());
        assert!(!ProviderError::Missing("ami-1".into()).is_transient());
    }

    #[test]
    fn transport_errors_are_not_throttling() {
        assert!(ProviderError::api("Throttling", "rate exceeded").is_throttling());
        assert!(!ProviderError::Transport("timeout".into()).is_throttling());
        assert!(!ProviderError::api(CODE_SNAPSHOT_IN_USE, "in use").is_throttling());
    }
}
