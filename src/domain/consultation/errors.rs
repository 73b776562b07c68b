//! Consultation-specific error types.

use thiserror::Error;

use super::Role;
use crate::domain::foundation::SessionId;

/// Errors raised while orchestrating a consultation.
///
/// Every variant is handled at the boundary where it occurs; the stable
/// `code()` is what clients see in ERROR frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsultationError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("A doctor is already attached to session {0}")]
    DoctorSlotOccupied(SessionId),

    #[error("Draft generation failed: {0}")]
    DraftGenerationFailed(String),

    #[error("Invalid review decision: {0}")]
    InvalidDecisionFormat(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid or missing doctor token")]
    InvalidToken,

    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("{role} connections cannot {action}")]
    NotPermitted { role: Role, action: &'static str },

    #[error("No draft is pending review in session {0}")]
    NoDraftPending(SessionId),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}

impl ConsultationError {
    pub fn draft_failed(reason: impl Into<String>) -> Self {
        ConsultationError::DraftGenerationFailed(reason.into())
    }

    pub fn invalid_decision(reason: impl Into<String>) -> Self {
        ConsultationError::InvalidDecisionFormat(reason.into())
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        ConsultationError::Transport(reason.into())
    }

    pub fn invalid_handshake(reason: impl Into<String>) -> Self {
        ConsultationError::InvalidHandshake(reason.into())
    }

    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        ConsultationError::MalformedFrame(reason.into())
    }

    pub fn not_permitted(role: Role, action: &'static str) -> Self {
        ConsultationError::NotPermitted { role, action }
    }

    /// Stable machine-readable code carried in ERROR frames.
    pub fn code(&self) -> &'static str {
        match self {
            ConsultationError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ConsultationError::DoctorSlotOccupied(_) => "DOCTOR_SLOT_OCCUPIED",
            ConsultationError::DraftGenerationFailed(_) => "DRAFT_GENERATION_FAILED",
            ConsultationError::InvalidDecisionFormat(_) => "INVALID_DECISION_FORMAT",
            ConsultationError::Transport(_) => "TRANSPORT_ERROR",
            ConsultationError::InvalidToken => "INVALID_TOKEN",
            ConsultationError::InvalidHandshake(_) => "INVALID_HANDSHAKE",
            ConsultationError::NotPermitted { .. } => "NOT_PERMITTED",
            ConsultationError::NoDraftPending(_) => "NO_DRAFT_PENDING",
            ConsultationError::MalformedFrame(_) => "MALFORMED_FRAME",
        }
    }

    /// True if the error ends the connection that caused it.
    ///
    /// `SessionNotFound` is fatal: a connection is bound to exactly one
    /// session for its lifetime, so once that session is gone every later
    /// frame would fail the same way.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            ConsultationError::Transport(_)
                | ConsultationError::InvalidHandshake(_)
                | ConsultationError::InvalidToken
                | ConsultationError::DoctorSlotOccupied(_)
                | ConsultationError::SessionNotFound(_)
        )
    }
}
