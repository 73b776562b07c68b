//! Draft generation adapters.
//!
//! ## Available Adapters
//!
//! - `RemoteAnswerService` - external AI answer service over HTTP
//! - `LlmDraftGenerator` - drafts straight from an `AIProvider`
//! - `OpenAIProvider` - OpenAI chat completions
//! - `MockDraftGenerator` / `MockAIProvider` - scripted doubles for testing

mod llm_draft_generator;
mod mock_draft_generator;
mod mock_provider;
mod openai_provider;
mod prompt;
mod remote_answer_service;

pub use llm_draft_generator::{LlmDraftGenerator, LlmDraftSettings};
pub use mock_draft_generator::MockDraftGenerator;
pub use mock_provider::{MockAIProvider, MockError, MockResponse};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};
pub use remote_answer_service::{RemoteAnswerConfig, RemoteAnswerService};
