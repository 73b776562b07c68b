//! Draft generation configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::ai::{LlmDraftSettings, OpenAIConfig, RemoteAnswerConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Which draft generator to run
    #[serde(default)]
    pub draft_backend: DraftBackend,

    /// Base URL of the AI answer service (remote backend)
    pub remote_url: Option<String>,

    /// OpenAI API key (openai backend)
    pub openai_api_key: Option<Secret<String>>,

    #[serde(default = "default_model")]
    pub model: String,

    pub openai_base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Draft text returned by the mock backend
    #[serde(default = "default_mock_draft")]
    pub mock_draft: String,
}

/// Draft generator implementation
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DraftBackend {
    #[default]
    Remote,
    OpenAI,
    Mock,
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_openai(&self) -> bool {
        self.openai_api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }

    pub fn remote_config(&self) -> Option<RemoteAnswerConfig> {
        self.remote_url
            .as_ref()
            .map(|url| RemoteAnswerConfig::new(url.clone()).with_timeout(self.timeout()))
    }

    pub fn openai_config(&self) -> Option<OpenAIConfig> {
        let key = self.openai_api_key.clone().filter(|_| self.has_openai())?;
        let mut config = OpenAIConfig::new(key)
            .with_model(self.model.clone())
            .with_timeout(self.timeout());
        if let Some(url) = &self.openai_base_url {
            config = config.with_base_url(url.clone());
        }
        Some(config)
    }

    pub fn llm_settings(&self) -> LlmDraftSettings {
        LlmDraftSettings {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.draft_backend {
            DraftBackend::Remote => {
                let url = self
                    .remote_url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .ok_or(ValidationError::MissingRequired("AI_REMOTE_URL"))?;
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ValidationError::InvalidServiceUrl);
                }
            }
            DraftBackend::OpenAI => {
                if !self.has_openai() {
                    return Err(ValidationError::MissingRequired("OPENAI_API_KEY"));
                }
            }
            DraftBackend::Mock => {}
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidTemperature);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            draft_backend: DraftBackend::default(),
            remote_url: None,
            openai_api_key: None,
            model: default_model(),
            openai_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
            mock_draft: default_mock_draft(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_mock_draft() -> String {
    "This is a placeholder draft answer".to_string()
}
