//! Draft generator that talks to an LLM provider directly.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::prompt;
use crate::domain::consultation::{AIDraft, Confidence, DraftRequest};
use crate::ports::{AIError, AIProvider, CompletionRequest, DraftError, DraftGenerator, MessageRole};

/// Sampling settings for draft completions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlmDraftSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmDraftSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Builds the prompt from the patient context, scores the answer by how the
/// model stopped and pulls cited references out of it.
pub struct LlmDraftGenerator {
    provider: Arc<dyn AIProvider>,
    settings: LlmDraftSettings,
}

impl LlmDraftGenerator {
    pub fn new(provider: Arc<dyn AIProvider>, settings: LlmDraftSettings) -> Self {
        Self { provider, settings }
    }
}

impl From<AIError> for DraftError {
    fn from(err: AIError) -> Self {
        match err {
            AIError::Timeout { .. } => DraftError::Timeout,
            AIError::Unavailable { .. } | AIError::Network(_) | AIError::RateLimited { .. } => {
                DraftError::unavailable(err.to_string())
            }
            AIError::Parse(_) => DraftError::invalid_response(err.to_string()),
            AIError::ContentFiltered { .. }
            | AIError::AuthenticationFailed
            | AIError::InvalidRequest(_) => DraftError::rejected(err.to_string()),
        }
    }
}

#[async_trait]
impl DraftGenerator for LlmDraftGenerator {
    async fn generate(&self, request: DraftRequest) -> Result<AIDraft, DraftError> {
        let completion = CompletionRequest::new()
            .with_system_prompt(prompt::system_prompt(&request.context))
            .with_message(MessageRole::User, prompt::user_prompt(&request.question))
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .with_trace_id(request.session_id.to_string());

        let response = self.provider.complete(completion).await?;

        if response.content.trim().is_empty() {
            return Err(DraftError::invalid_response("model returned an empty answer"));
        }

        let confidence = Confidence::clamped(prompt::confidence_for(response.finish_reason));
        let references = prompt::extract_references(&response.content);

        debug!(
            session_id = %request.session_id,
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            confidence = confidence.value(),
            "LLM draft generated"
        );

        Ok(AIDraft::for_request(
            &request,
            response.content,
            confidence,
            references,
        ))
    }

    fn name(&self) -> &'static str {
        "LlmDraftGenerator"
    }
}
