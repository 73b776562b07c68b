//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, error types and the event envelope that the
//! consultation domain is built from.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{
    domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent,
};
pub use ids::{ConnectionId, DraftId, MessageId, SessionId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
