//! Events published on the notification bus.

use serde::{Deserialize, Serialize};

use super::{AIDraft, Confidence, ReviewAction, ReviewDecision, ReviewOutcome};
use crate::domain::foundation::{
    domain_event, ConnectionId, DraftId, EventId, MessageId, SessionId, Timestamp,
};

/// A draft was generated and should reach the session's doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReady {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub draft: AIDraft,
    pub occurred_at: Timestamp,
}

impl DraftReady {
    pub fn new(draft: AIDraft) -> Self {
        Self {
            event_id: EventId::new(),
            session_id: draft.session_id,
            draft,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    DraftReady,
    event_type = "draft.ready.v1",
    aggregate_id = session_id,
    aggregate_type = "Session",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Draft generation failed for a patient message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftFailed {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub reason: String,
    pub occurred_at: Timestamp,
}

impl DraftFailed {
    pub fn new(session_id: SessionId, message_id: MessageId, reason: impl Into<String>) -> Self {
        Self {
            event_id: EventId::new(),
            session_id,
            message_id,
            reason: reason.into(),
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    DraftFailed,
    event_type = "draft.failed.v1",
    aggregate_id = session_id,
    aggregate_type = "Session",
    occurred_at = occurred_at,
    event_id = event_id
);

/// A doctor finished reviewing a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDone {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub draft_id: Option<DraftId>,
    pub question: Option<String>,
    pub draft_content: Option<String>,
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub references: Vec<String>,
    pub action: ReviewAction,
    /// Text the patient received; `None` for REJECT.
    pub delivered_content: Option<String>,
    pub reviewer: ConnectionId,
    pub occurred_at: Timestamp,
}

impl ReviewDone {
    pub fn from_outcome(decision: &ReviewDecision, outcome: &ReviewOutcome) -> Self {
        let draft = outcome.draft();
        Self {
            event_id: EventId::new(),
            session_id: decision.session_id(),
            draft_id: draft.map(|d| d.draft_id),
            question: draft.map(|d| d.question.clone()),
            draft_content: draft.map(|d| d.content.clone()),
            confidence: draft.map(|d| d.confidence),
            references: draft.map(|d| d.references.clone()).unwrap_or_default(),
            action: decision.action(),
            delivered_content: outcome.delivered_content().map(str::to_string),
            reviewer: decision.reviewer(),
            occurred_at: decision.decided_at(),
        }
    }
}

domain_event!(
    ReviewDone,
    event_type = "review.done.v1",
    aggregate_id = session_id,
    aggregate_type = "Session",
    occurred_at = occurred_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consultation::{DraftRequest, PatientContext};
    use crate::domain::foundation::{DomainEvent, SerializableDomainEvent};

    fn sample_draft() -> AIDraft {
        let request = DraftRequest::new(
            SessionId::new(),
            MessageId::new(),
            "I have a headache",
            PatientContext::default(),
        );
        AIDraft::for_request(
            &request,
            "Rest and hydrate.",
            Confidence::clamped(0.95),
            vec!["[1] Headache guidelines".to_string()],
        )
    }

    #[test]
    fn draft_ready_is_keyed_by_session() {
        let draft = sample_draft();
        let event = DraftReady::new(draft.clone());
        assert_eq!(event.aggregate_id(), draft.session_id.to_string());
        assert_eq!(event.event_type(), "draft.ready.v1");
    }

    #[test]
    fn draft_ready_envelope_round_trips_payload() {
        let event = DraftReady::new(sample_draft());
        let envelope = event.to_envelope().unwrap();
        let back: DraftReady = envelope.payload_as().unwrap();
        assert_eq!(back.draft, event.draft);
    }

    #[test]
    fn review_done_captures_draft_and_delivery() {
        let draft = sample_draft();
        let decision = ReviewDecision::new(
            draft.session_id,
            ConnectionId::new(),
            ReviewAction::Modify,
            Some("Take ibuprofen".to_string()),
            Some(draft.draft_id),
        )
        .unwrap();
        let outcome = decision.resolve(Some(draft.clone())).unwrap();
        let event = ReviewDone::from_outcome(&decision, &outcome);

        assert_eq!(event.draft_id, Some(draft.draft_id));
        assert_eq!(event.draft_content.as_deref(), Some("Rest and hydrate."));
        assert_eq!(event.delivered_content.as_deref(), Some("Take ibuprofen"));
        assert_eq!(event.references.len(), 1);
        assert_eq!(event.action, ReviewAction::Modify);
    }
}
