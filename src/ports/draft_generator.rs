//! DraftGenerator port - produces AI draft answers for patient questions.

use async_trait::async_trait;

use crate::domain::consultation::{AIDraft, DraftRequest};

/// Failures of the external answer service, surfaced to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("answer service unavailable: {0}")]
    Unavailable(String),

    #[error("answer service timed out")]
    Timeout,

    #[error("answer service rejected the request: {0}")]
    Rejected(String),

    #[error("invalid response from answer service: {0}")]
    InvalidResponse(String),
}

impl DraftError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

/// Port for draft generation.
///
/// One call per request, no retries: retry policy belongs to the service
/// or an outer layer.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(&self, request: DraftRequest) -> Result<AIDraft, DraftError>;

    /// Generator name for logging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn DraftGenerator) {}

    #[test]
    fn errors_display_cause() {
        assert_eq!(
            DraftError::unavailable("connection refused").to_string(),
            "answer service unavailable: connection refused"
        );
        assert_eq!(DraftError::Timeout.to_string(), "answer service timed out");
    }
}
