//! Event infrastructure for notifications crossing the bus.
//!
//! - `EventId` - Unique identifier for events (deduplication)
//! - `EventMetadata` - Correlation context
//! - `EventEnvelope` - Transport wrapper for domain events
//! - `DomainEvent` - Trait that all domain events implement
//! - `domain_event!` - Macro to simplify DomainEvent implementations

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::Timestamp;

/// Trait that all domain events must implement.
pub trait DomainEvent: Send + Sync {
    /// Returns the event type string (e.g., "draft.ready.v1").
    fn event_type(&self) -> &'static str;

    /// Returns the ID of the aggregate that emitted this event.
    fn aggregate_id(&self) -> String;

    /// Returns the type of aggregate (e.g., "Session").
    fn aggregate_type(&self) -> &'static str;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Returns the unique ID for this event instance.
    fn event_id(&self) -> EventId;
}

/// Extension trait that provides `to_envelope()` for serializable domain events.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    /// Converts this domain event into an `EventEnvelope` for transport.
    fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        EventEnvelope::from_event(self)
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

/// Implements `DomainEvent` by naming the fields that carry each piece.
///
/// ```ignore
/// domain_event!(
///     DraftReady,
///     event_type = "draft.ready.v1",
///     aggregate_id = session_id,
///     aggregate_type = "Session",
///     occurred_at = created_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        event_type = $event_type:expr,
        aggregate_id = $agg_id_field:ident,
        aggregate_type = $agg_type:expr,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $agg_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field.clone()
            }
        }
    };
}

pub use domain_event;

/// Unique identifier for events (used for deduplication).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation context carried alongside an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Links every event produced for one patient question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Transport envelope for domain events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Event type for routing (e.g., "draft.ready.v1").
    pub event_type: String,

    /// Schema version number (extracted from event_type).
    pub schema_version: u32,

    pub aggregate_id: String,
    pub aggregate_type: String,
    pub occurred_at: Timestamp,

    /// Event-specific payload as JSON.
    pub payload: JsonValue,

    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Creates a new EventEnvelope with required fields.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        let schema_version = Self::extract_version(&event_type);

        Self {
            event_id: EventId::new(),
            event_type,
            schema_version,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Extracts version number from an event_type like "draft.ready.v2".
    /// Defaults to 1 when no suffix is present.
    pub(crate) fn extract_version(event_type: &str) -> u32 {
        event_type
            .rsplit_once(".v")
            .and_then(|(_, version_str)| version_str.parse::<u32>().ok())
            .unwrap_or(1)
    }

    /// Creates an envelope from a domain event, serializing it as the payload.
    pub fn from_event<T>(event: &T) -> Result<Self, serde_json::Error>
    where
        T: DomainEvent + Serialize + ?Sized,
    {
        let event_type = event.event_type().to_string();
        let schema_version = Self::extract_version(&event_type);

        Ok(Self {
            event_id: event.event_id(),
            event_type,
            schema_version,
            aggregate_id: event.aggregate_id(),
            aggregate_type: event.aggregate_type().to_string(),
            occurred_at: event.occurred_at(),
            payload: serde_json::to_value(event)?,
            metadata: EventMetadata::default(),
        })
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    /// Deserialize payload to a specific event type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
impl EventEnvelope {
    /// Creates a test fixture EventEnvelope for use in tests.
    pub fn test_fixture() -> Self {
        Self::new(
            "test.event.v1",
            "test-aggregate-123",
            "TestAggregate",
            serde_json::json!({"test": "data"}),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Pinged {
        event_id: EventId,
        session: String,
        at: Timestamp,
    }

    domain_event!(
        Pinged,
        event_type = "ping.sent.v2",
        aggregate_id = session,
        aggregate_type = "Session",
        occurred_at = at,
        event_id = event_id
    );

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn extract_version_reads_suffix() {
        assert_eq!(EventEnvelope::extract_version("draft.ready.v2"), 2);
        assert_eq!(EventEnvelope::extract_version("draft.ready.v10"), 10);
        assert_eq!(EventEnvelope::extract_version("legacy"), 1);
    }

    #[test]
    fn to_envelope_copies_event_fields() {
        let event = Pinged {
            event_id: EventId::from_string("evt-1"),
            session: "s-1".to_string(),
            at: Timestamp::now(),
        };
        let envelope = event.to_envelope().unwrap();

        assert_eq!(envelope.event_id.as_str(), "evt-1");
        assert_eq!(envelope.event_type, "ping.sent.v2");
        assert_eq!(envelope.schema_version, 2);
        assert_eq!(envelope.aggregate_id, "s-1");
        assert_eq!(envelope.aggregate_type, "Session");

        let back: Pinged = envelope.payload_as().unwrap();
        assert_eq!(back.session, "s-1");
    }

    #[test]
    fn envelope_survives_json_round_trip() {
        let envelope = EventEnvelope::new("x.y.v1", "agg", "Agg", json!({"k": 1}))
            .with_correlation_id("corr-9");
        let text = serde_json::to_string(&envelope).unwrap();
        let back: EventEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back.event_id, envelope.event_id);
        assert_eq!(back.payload["k"], 1);
        assert_eq!(back.metadata.correlation_id.as_deref(), Some("corr-9"));
    }

    #[test]
    fn metadata_omits_empty_fields() {
        let text = serde_json::to_string(&EventMetadata::default()).unwrap();
        assert_eq!(text, "{}");
    }

    #[test]
    fn metadata_tolerates_fields_it_does_not_carry() {
        let text = r#"{"correlation_id":"corr-1","causation_id":"evt-0"}"#;
        let metadata: EventMetadata = serde_json::from_str(text).unwrap();
        assert_eq!(metadata.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(serde_json::to_string(&metadata).unwrap(), r#"{"correlation_id":"corr-1"}"#);
    }
}
