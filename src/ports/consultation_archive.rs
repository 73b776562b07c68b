//! Consultation archive port - durable record of finalised exchanges.
//!
//! Archiving is downstream of delivery: nothing on the chat path waits for it.

use async_trait::async_trait;

use crate::domain::consultation::{ReviewAction, ReviewDone};
use crate::domain::foundation::{DomainError, DraftId, SessionId, Timestamp};

/// A reviewed question/answer pair ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedExchange {
    pub session_id: SessionId,
    pub draft_id: Option<DraftId>,
    pub question: String,
    pub ai_draft: Option<String>,
    pub ai_confidence: Option<f64>,
    pub ai_references: Vec<String>,
    /// What the patient received.
    pub final_answer: String,
    pub review_status: ReviewAction,
    pub reviewer: String,
    pub reviewed_at: Timestamp,
}

impl ArchivedExchange {
    /// Builds the archive record for a review, if the review delivered an answer.
    pub fn from_review(event: &ReviewDone) -> Option<Self> {
        let final_answer = event.delivered_content.clone()?;
        Some(Self {
            session_id: event.session_id,
            draft_id: event.draft_id,
            question: event.question.clone().unwrap_or_default(),
            ai_draft: event.draft_content.clone(),
            ai_confidence: event.confidence.map(|c| c.value()),
            ai_references: event.references.clone(),
            final_answer,
            review_status: event.action,
            reviewer: event.reviewer.to_string(),
            reviewed_at: event.occurred_at,
        })
    }
}

#[async_trait]
pub trait ConsultationArchive: Send + Sync {
    async fn archive(&self, exchange: ArchivedExchange) -> Result<(), DomainError>;
}
