//! AI draft requests and results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{DraftId, MessageId, SessionId, Timestamp, ValidationError};

/// Model confidence in a draft, always within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Creates a confidence value, rejecting NaN and anything outside `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::out_of_range("confidence", 0.0, 1.0, value));
        }
        Ok(Self(value))
    }

    /// Forces an arbitrary score into range. NaN becomes zero.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Confidence::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// Patient data the answer service uses to ground its draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    /// Recent measurements, e.g. `blood_pressure -> 120/80`.
    #[serde(default)]
    pub biometrics: BTreeMap<String, String>,
    /// Earlier turns of the conversation, oldest first.
    #[serde(default)]
    pub chat_history: Vec<String>,
}

/// One request for a draft answer. Consumed once by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub question: String,
    pub context: PatientContext,
    pub requested_at: Timestamp,
}

impl DraftRequest {
    pub fn new(
        session_id: SessionId,
        message_id: MessageId,
        question: impl Into<String>,
        context: PatientContext,
    ) -> Self {
        Self {
            session_id,
            message_id,
            question: question.into(),
            context,
            requested_at: Timestamp::now(),
        }
    }
}

/// A generated candidate answer. Only ever shown to the doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIDraft {
    pub draft_id: DraftId,
    pub session_id: SessionId,
    /// The patient message this draft answers.
    pub message_id: MessageId,
    pub question: String,
    pub content: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub references: Vec<String>,
    pub created_at: Timestamp,
}

impl AIDraft {
    /// Builds the draft answering `request`.
    pub fn for_request(
        request: &DraftRequest,
        content: impl Into<String>,
        confidence: Confidence,
        references: Vec<String>,
    ) -> Self {
        Self {
            draft_id: DraftId::new(),
            session_id: request.session_id,
            message_id: request.message_id,
            question: request.question.clone(),
            content: content.into(),
            confidence,
            references,
            created_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_accepts_bounds() {
        assert_eq!(Confidence::new(0.0).unwrap().value(), 0.0);
        assert_eq!(Confidence::new(1.0).unwrap().value(), 1.0);
    }

    #[test]
    fn confidence_rejects_out_of_range_and_nan() {
        assert!(Confidence::new(1.01).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert!(Confidence::new(f64::NAN).is_err());
    }

    #[test]
    fn clamped_forces_into_range() {
        assert_eq!(Confidence::clamped(7.0).value(), 1.0);
        assert_eq!(Confidence::clamped(-3.0).value(), 0.0);
        assert_eq!(Confidence::clamped(f64::NAN).value(), 0.0);
    }

    #[test]
    fn confidence_deserialization_is_validated() {
        assert!(serde_json::from_str::<Confidence>("0.95").is_ok());
        assert!(serde_json::from_str::<Confidence>("1.5").is_err());
    }

    #[test]
    fn draft_links_back_to_request() {
        let request = DraftRequest::new(
            SessionId::new(),
            MessageId::new(),
            "I have a headache",
            PatientContext::default(),
        );
        let draft = AIDraft::for_request(
            &request,
            "Rest and hydrate.",
            Confidence::new(0.95).unwrap(),
            vec!["ref: WHO".to_string()],
        );
        assert_eq!(draft.session_id, request.session_id);
        assert_eq!(draft.message_id, request.message_id);
        assert_eq!(draft.question, "I have a headache");
    }

    #[test]
    fn patient_context_fields_default_when_missing() {
        let ctx: PatientContext = serde_json::from_str(r#"{"age": 30}"#).unwrap();
        assert_eq!(ctx.age, Some(30));
        assert!(ctx.medical_history.is_empty());
        assert!(ctx.biometrics.is_empty());
    }
}
