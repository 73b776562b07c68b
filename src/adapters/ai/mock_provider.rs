//! Mock AI Provider for testing.
//!
//! Returns scripted completions in order, optionally after a delay, and
//! records every request it receives.
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response("Rest and hydrate.")
//!     .with_error(MockError::Timeout);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, ProviderInfo,
    TokenUsage,
};

/// Mock AI provider for testing.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success {
        content: String,
        finish_reason: FinishReason,
    },
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Timeout,
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Timeout => AIError::Timeout { timeout_secs: 0 },
        }
    }
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a completion that stopped naturally.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.with_response_full(content, FinishReason::Stop)
    }

    pub fn with_response_full(self, content: impl Into<String>, finish_reason: FinishReason) -> Self {
        self.push(MockResponse::Success {
            content: content.into(),
            finish_reason,
        });
        self
    }

    pub fn with_error(self, error: MockError) -> Self {
        self.push(MockResponse::Error(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(MockResponse::Success {
                content,
                finish_reason,
            }) => Ok(CompletionResponse {
                content,
                usage: TokenUsage::new(10, 20),
                model: "mock-model-1".to_string(),
                finish_reason,
            }),
            Some(MockResponse::Error(err)) => Err(err.into()),
            None => Err(AIError::unavailable("no mock responses queued")),
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("mock", "mock-model-1")
    }
}
