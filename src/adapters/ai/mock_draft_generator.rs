//! Scripted draft generator for tests and local runs.
//!
//! Scripted outcomes are consumed in order. Once the script is exhausted
//! the fallback applies: echo a canned draft, or fail if none was set.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::consultation::{AIDraft, Confidence, DraftRequest};
use crate::ports::{DraftError, DraftGenerator};

#[derive(Debug, Clone)]
enum Scripted {
    Draft {
        content: String,
        confidence: Confidence,
        references: Vec<String>,
    },
    Error(DraftError),
}

#[derive(Debug, Clone)]
pub struct MockDraftGenerator {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Option<Scripted>,
    delay: Duration,
    calls: Arc<Mutex<Vec<DraftRequest>>>,
}

impl Default for MockDraftGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDraftGenerator {
    /// A generator with an empty script and no fallback.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A generator that always answers with a fixed draft.
    pub fn echoing(content: impl Into<String>, confidence: Confidence) -> Self {
        let mut generator = Self::new();
        generator.fallback = Some(Scripted::Draft {
            content: content.into(),
            confidence,
            references: Vec::new(),
        });
        generator
    }

    pub fn with_draft(self, content: impl Into<String>, confidence: Confidence) -> Self {
        self.with_draft_and_references(content, confidence, Vec::new())
    }

    pub fn with_draft_and_references(
        self,
        content: impl Into<String>,
        confidence: Confidence,
        references: Vec<String>,
    ) -> Self {
        self.push(Scripted::Draft {
            content: content.into(),
            confidence,
            references,
        });
        self
    }

    pub fn with_error(self, error: DraftError) -> Self {
        self.push(Scripted::Error(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<DraftRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, outcome: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }
}

#[async_trait]
impl DraftGenerator for MockDraftGenerator {
    async fn generate(&self, request: DraftRequest) -> Result<AIDraft, DraftError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .or_else(|| self.fallback.clone());

        match next {
            Some(Scripted::Draft {
                content,
                confidence,
                references,
            }) => Ok(AIDraft::for_request(&request, content, confidence, references)),
            Some(Scripted::Error(err)) => Err(err),
            None => Err(DraftError::unavailable("no scripted draft")),
        }
    }

    fn name(&self) -> &'static str {
        "MockDraftGenerator"
    }
}
