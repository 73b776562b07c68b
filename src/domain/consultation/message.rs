//! Chat messages relayed between participants.

use serde::{Deserialize, Serialize};

use super::{MessageAuthor, Role};
use crate::domain::foundation::{MessageId, SessionId, Timestamp};

pub const DOCTOR_JOINED_NOTICE: &str = "Doctor has joined the chat";
pub const DOCTOR_REVIEWING_NOTICE: &str = "Doctor is reviewing your question...";
pub const RESPONSE_REJECTED_NOTICE: &str = "AI response rejected. Please compose new response.";
pub const DOCTOR_LEFT_NOTICE: &str = "Doctor has left the chat. Another doctor will join shortly.";
pub const PATIENT_LEFT_NOTICE: &str = "Patient has left the chat. The consultation has ended.";

/// One message in a consultation. Not persisted: forwarded and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub author: MessageAuthor,
    pub content: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    /// A message written by a participant. Content is kept verbatim.
    pub fn from_participant(session_id: SessionId, role: Role, content: impl Into<String>) -> Self {
        Self::new(session_id, role.into(), content.into())
    }

    /// A system-authored notice.
    pub fn system(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageAuthor::System, content.into())
    }

    fn new(session_id: SessionId, author: MessageAuthor, content: String) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            author,
            content,
            timestamp: Timestamp::now(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.author == MessageAuthor::System
    }
}
