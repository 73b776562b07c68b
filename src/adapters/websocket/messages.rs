//! WebSocket message types for the consultation chat.
//!
//! Every frame in either direction is a JSON object
//! `{type, sessionId?, payload, timestamp?}`:
//! - Client → Server: `MESSAGE`, `REVIEW`, `PING`
//! - Server → Client: `SESSION_STARTED`, `MESSAGE`, `DRAFT_READY`, `ERROR`, `PONG`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::application::ReviewCommand;
use crate::domain::consultation::{ConsultationError, Frame, ReviewAction};
use crate::domain::foundation::{DraftId, SessionId, Timestamp};

// ============================================
// Client → Server Messages
// ============================================

/// Frame types a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundKind {
    Message,
    Review,
    Ping,
    #[serde(other)]
    Unknown,
}

/// A raw frame as received from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: InboundKind,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewPayload {
    action: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    draft_id: Option<DraftId>,
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Message { content: String },
    Review(ReviewCommand),
    Ping,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, ConsultationError> {
        serde_json::from_str(text).map_err(|e| ConsultationError::malformed_frame(e.to_string()))
    }

    /// Validates the frame against the session its connection is bound to.
    ///
    /// MESSAGE accepts either a bare string payload or `{content}`. Review
    /// payload problems are reported as `INVALID_DECISION_FORMAT`.
    pub fn into_client_message(self, bound: SessionId) -> Result<ClientMessage, ConsultationError> {
        if let Some(raw) = self.session_id.as_deref() {
            let addressed: SessionId = raw
                .parse()
                .map_err(|_| ConsultationError::malformed_frame(format!("invalid session id '{}'", raw)))?;
            if addressed != bound {
                return Err(ConsultationError::malformed_frame(
                    "frame addressed to a different session",
                ));
            }
        }

        match self.kind {
            InboundKind::Ping => Ok(ClientMessage::Ping),
            InboundKind::Message => {
                let content = match self.payload {
                    Value::String(text) => Some(text),
                    Value::Object(mut fields) => match fields.remove("content") {
                        Some(Value::String(text)) => Some(text),
                        _ => None,
                    },
                    _ => None,
                };
                match content {
                    Some(content) if !content.is_empty() => Ok(ClientMessage::Message { content }),
                    _ => Err(ConsultationError::malformed_frame("MESSAGE requires text content")),
                }
            }
            InboundKind::Review => {
                let payload: ReviewPayload = serde_json::from_value(self.payload)
                    .map_err(|e| ConsultationError::invalid_decision(e.to_string()))?;
                let action: ReviewAction = payload.action.parse()?;
                Ok(ClientMessage::Review(ReviewCommand {
                    action,
                    content: payload.content,
                    draft_id: payload.draft_id,
                }))
            }
            InboundKind::Unknown => Err(ConsultationError::malformed_frame("unknown frame type")),
        }
    }
}

// ============================================
// Server → Client Messages
// ============================================

/// Wire form of an outbound [`Frame`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub payload: Value,
    pub timestamp: String,
}

impl From<&Frame> for ServerFrame {
    fn from(frame: &Frame) -> Self {
        let (session_id, payload) = match frame {
            Frame::SessionStarted { session_id } => {
                (Some(*session_id), json!({ "sessionId": session_id }))
            }
            Frame::Message(message) => (
                Some(message.session_id),
                json!({
                    "messageId": message.id,
                    "role": message.author,
                    "content": message.content,
                    "sentAt": message.timestamp,
                }),
            ),
            Frame::DraftReady(draft) => (
                Some(draft.session_id),
                json!({
                    "draftId": draft.draft_id,
                    "messageId": draft.message_id,
                    "question": draft.question,
                    "content": draft.content,
                    "confidence": draft.confidence,
                    "references": draft.references,
                }),
            ),
            Frame::Error {
                session_id,
                code,
                message,
            } => (*session_id, json!({ "code": code, "message": message })),
            Frame::Pong => (None, Value::Null),
        };

        Self {
            kind: frame.kind(),
            session_id,
            payload,
            timestamp: Timestamp::now().to_rfc3339(),
        }
    }
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
