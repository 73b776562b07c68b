//! Notification bus ports - publish/subscribe between the chat transport and
//! the asynchronous drafting path.
//!
//! Publishing is fire-and-forget from the caller's point of view: errors are
//! returned so the caller can log them, never so it can abort. Subscribers
//! register under a consumer group; each message reaches one handler per
//! group.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope, ValidationError};

/// Logical channels on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    DraftReady,
    DraftFailed,
    ReviewDone,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::DraftReady, Topic::DraftFailed, Topic::ReviewDone];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::DraftReady => "draft-ready",
            Topic::DraftFailed => "draft-failed",
            Topic::ReviewDone => "review-done",
        }
    }

    /// Topic an envelope travels on, derived from its event type.
    pub fn for_event_type(event_type: &str) -> Option<Topic> {
        if event_type.starts_with("draft.ready.") {
            Some(Topic::DraftReady)
        } else if event_type.starts_with("draft.failed.") {
            Some(Topic::DraftFailed)
        } else if event_type.starts_with("review.done.") {
            Some(Topic::ReviewDone)
        } else {
            None
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("topic", format!("unknown topic '{}'", s)))
    }
}

/// Port for publishing notifications.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publishes an envelope on the topic matching its event type.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;
}

/// Handler for notifications consumed from the bus.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for subscribing to a topic under a consumer group.
pub trait NotificationSubscriber: Send + Sync {
    fn subscribe(&self, topic: Topic, group: &str, handler: Arc<dyn NotificationHandler>);
}

/// Publisher and subscriber in one.
pub trait NotificationBus: NotificationPublisher + NotificationSubscriber {}

impl<T: NotificationPublisher + NotificationSubscriber> NotificationBus for T {}
