//! Client for the external AI answer service.
//!
//! `POST {base_url}/v1/draft-answers` with the question and patient context;
//! the service answers with a draft, a confidence score and references.
//! Exactly one attempt is made per draft request.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::consultation::{AIDraft, Confidence, DraftRequest};
use crate::ports::{DraftError, DraftGenerator};

/// Connection settings for the answer service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAnswerConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl RemoteAnswerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct RemoteAnswerService {
    config: RemoteAnswerConfig,
    client: Client,
}

impl RemoteAnswerService {
    pub fn new(config: RemoteAnswerConfig) -> Result<Self, DraftError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DraftError::unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/draft-answers", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl DraftGenerator for RemoteAnswerService {
    async fn generate(&self, request: DraftRequest) -> Result<AIDraft, DraftError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&AnswerRequest::from(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DraftError::Timeout
                } else {
                    DraftError::unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, body));
        }

        let answer: AnswerResponse = response
            .json()
            .await
            .map_err(|e| DraftError::invalid_response(e.to_string()))?;

        debug!(
            session_id = %request.session_id,
            confidence = answer.confidence_score,
            references = answer.references.len(),
            "Answer service returned a draft"
        );

        answer.into_draft(&request)
    }

    fn name(&self) -> &'static str {
        "RemoteAnswerService"
    }
}

fn error_for_status(status: StatusCode, body: String) -> DraftError {
    if status.is_client_error() {
        DraftError::rejected(format!("{}: {}", status, body))
    } else {
        DraftError::unavailable(format!("{}: {}", status, body))
    }
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    question_id: String,
    question_text: &'a str,
    user_context: UserContext<'a>,
}

#[derive(Debug, Serialize)]
struct UserContext<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<&'a str>,
    medical_history: &'a [String],
    biometric_data: &'a BTreeMap<String, String>,
    chat_history: &'a [String],
}

impl<'a> From<&'a DraftRequest> for AnswerRequest<'a> {
    fn from(request: &'a DraftRequest) -> Self {
        Self {
            question_id: request.message_id.to_string(),
            question_text: &request.question,
            user_context: UserContext {
                age: request.context.age,
                gender: request.context.gender.as_deref(),
                medical_history: &request.context.medical_history,
                biometric_data: &request.context.biometrics,
                chat_history: &request.context.chat_history,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    draft_answer: String,
    confidence_score: f64,
    #[serde(default)]
    references: Vec<String>,
}

impl AnswerResponse {
    fn into_draft(self, request: &DraftRequest) -> Result<AIDraft, DraftError> {
        if self.draft_answer.trim().is_empty() {
            return Err(DraftError::invalid_response("service returned an empty draft"));
        }
        let confidence = Confidence::new(self.confidence_score).map_err(|e| {
            DraftError::invalid_response(format!("confidence score: {}", e))
        })?;

        Ok(AIDraft::for_request(
            request,
            self.draft_answer,
            confidence,
            self.references,
        ))
    }
}
