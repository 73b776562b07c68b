//! Doctor review decisions on AI drafts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{AIDraft, ConsultationError};
use crate::domain::foundation::{ConnectionId, DraftId, SessionId, Timestamp};

/// What the doctor decided to do with a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approve,
    Modify,
    Reject,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "APPROVE",
            ReviewAction::Modify => "MODIFY",
            ReviewAction::Reject => "REJECT",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = ConsultationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(ReviewAction::Approve),
            "MODIFY" => Ok(ReviewAction::Modify),
            "REJECT" => Ok(ReviewAction::Reject),
            other => Err(ConsultationError::invalid_decision(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }
}

/// A validated review decision. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    session_id: SessionId,
    reviewer: ConnectionId,
    action: ReviewAction,
    content: Option<String>,
    draft_id: Option<DraftId>,
    decided_at: Timestamp,
}

impl ReviewDecision {
    /// Validates a decision.
    ///
    /// MODIFY must carry non-blank content. APPROVE delivers the draft text
    /// itself and REJECT delivers nothing, so their content is discarded.
    pub fn new(
        session_id: SessionId,
        reviewer: ConnectionId,
        action: ReviewAction,
        content: Option<String>,
        draft_id: Option<DraftId>,
    ) -> Result<Self, ConsultationError> {
        let content = match action {
            ReviewAction::Modify => match content {
                Some(text) if !text.trim().is_empty() => Some(text),
                _ => {
                    return Err(ConsultationError::invalid_decision(
                        "MODIFY requires non-empty content",
                    ))
                }
            },
            ReviewAction::Approve | ReviewAction::Reject => None,
        };

        Ok(Self {
            session_id,
            reviewer,
            action,
            content,
            draft_id,
            decided_at: Timestamp::now(),
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn reviewer(&self) -> ConnectionId {
        self.reviewer
    }

    pub fn action(&self) -> ReviewAction {
        self.action
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// The draft being reviewed; `None` means the most recent one.
    pub fn draft_id(&self) -> Option<DraftId> {
        self.draft_id
    }

    pub fn decided_at(&self) -> Timestamp {
        self.decided_at
    }

    /// Applies the decision to the draft it reviews.
    ///
    /// APPROVE needs a draft and delivers its content unchanged. MODIFY
    /// delivers the reviewer's text whether or not a draft is known.
    pub fn resolve(&self, draft: Option<AIDraft>) -> Result<ReviewOutcome, ConsultationError> {
        match self.action {
            ReviewAction::Approve => match draft {
                Some(draft) => Ok(ReviewOutcome::Deliver {
                    content: draft.content.clone(),
                    draft: Some(draft),
                }),
                None => Err(ConsultationError::NoDraftPending(self.session_id)),
            },
            ReviewAction::Modify => Ok(ReviewOutcome::Deliver {
                content: self.content.clone().unwrap_or_default(),
                draft,
            }),
            ReviewAction::Reject => Ok(ReviewOutcome::Rejected { draft }),
        }
    }
}

/// Result of applying a decision: exactly one patient message, or none.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Deliver {
        content: String,
        draft: Option<AIDraft>,
    },
    Rejected {
        draft: Option<AIDraft>,
    },
}

impl ReviewOutcome {
    pub fn delivered_content(&self) -> Option<&str> {
        match self {
            ReviewOutcome::Deliver { content, .. } => Some(content),
            ReviewOutcome::Rejected { .. } => None,
        }
    }

    pub fn draft(&self) -> Option<&AIDraft> {
        match self {
            ReviewOutcome::Deliver { draft, .. } | ReviewOutcome::Rejected { draft } => {
                draft.as_ref()
            }
        }
    }
}
