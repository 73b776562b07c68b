//! Outbound frames addressed to a single connection.

use super::{AIDraft, ChatMessage, ConsultationError};
use crate::domain::foundation::SessionId;

/// Everything the server can push to a client.
///
/// Transports translate each variant into their own wire format with an
/// exhaustive match, so adding a variant forces every transport to handle it.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Sent once to the patient that opened a session.
    SessionStarted { session_id: SessionId },
    Message(ChatMessage),
    /// Only ever delivered to a doctor connection.
    DraftReady(AIDraft),
    Error {
        session_id: Option<SessionId>,
        code: &'static str,
        message: String,
    },
    Pong,
}

impl Frame {
    pub fn error(session_id: Option<SessionId>, err: &ConsultationError) -> Self {
        Frame::Error {
            session_id,
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Frame::DraftReady(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::SessionStarted { .. } => "SESSION_STARTED",
            Frame::Message(_) => "MESSAGE",
            Frame::DraftReady(_) => "DRAFT_READY",
            Frame::Error { .. } => "ERROR",
            Frame::Pong => "PONG",
        }
    }
}
