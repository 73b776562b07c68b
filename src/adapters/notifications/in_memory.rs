//! In-memory notification bus.
//!
//! Delivers by direct callback inside `publish`, so a single-process
//! deployment needs no broker. Consumer groups behave like their Redis
//! counterpart: every group sees every message, and within a group the
//! members take turns.
//!
//! A bus built with `new()` keeps nothing once handlers have run. Tests that
//! assert on published envelopes build it with `capturing()`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{NotificationHandler, NotificationPublisher, NotificationSubscriber, Topic};

struct ConsumerGroup {
    name: String,
    members: Vec<Arc<dyn NotificationHandler>>,
    cursor: AtomicUsize,
}

impl ConsumerGroup {
    fn next_member(&self) -> Option<Arc<dyn NotificationHandler>> {
        if self.members.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.members.len();
        Some(self.members[index].clone())
    }
}

/// Process-local bus with consumer-group dispatch.
#[derive(Default)]
pub struct InMemoryNotificationBus {
    groups: RwLock<HashMap<Topic, Vec<ConsumerGroup>>>,
    /// `None` unless built with `capturing()`.
    published: Option<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryNotificationBus {
    /// Dispatch-only bus. Envelopes are dropped after delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that also records every routed envelope for later inspection.
    pub fn capturing() -> Self {
        Self {
            groups: RwLock::default(),
            published: Some(RwLock::default()),
        }
    }

    // === Test Helpers ===

    /// Returns all published events. Always empty unless capturing.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .as_ref()
            .map(|log| log.read().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Returns events published on a topic.
    pub fn events_on(&self, topic: Topic) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| Topic::for_event_type(&e.event_type) == Some(topic))
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published
            .as_ref()
            .map_or(0, |log| log.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published.as_ref().is_some_and(|log| {
            log.read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|e| e.event_type == event_type)
        })
    }

    /// Clears captured events (for test isolation).
    pub fn clear(&self) {
        if let Some(log) = &self.published {
            log.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let topic = Topic::for_event_type(&event.event_type).ok_or_else(|| {
            DomainError::new(
                ErrorCode::NotificationBusError,
                format!("No topic for event type '{}'", event.event_type),
            )
        })?;

        if let Some(log) = &self.published {
            log.write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }

        // Pick recipients under the lock, invoke them after releasing it
        let recipients: Vec<(String, Arc<dyn NotificationHandler>)> = {
            let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
            groups
                .get(&topic)
                .map(|groups| {
                    groups
                        .iter()
                        .filter_map(|g| g.next_member().map(|h| (g.name.clone(), h)))
                        .collect()
                })
                .unwrap_or_default()
        };

        if recipients.is_empty() {
            debug!(topic = %topic, event_id = %event.event_id, "No subscribers for notification");
        }

        for (group, handler) in recipients {
            if let Err(e) = handler.handle(event.clone()).await {
                warn!(
                    topic = %topic,
                    group = %group,
                    handler = handler.name(),
                    event_id = %event.event_id,
                    error = %e,
                    "Notification handler failed"
                );
            }
        }

        Ok(())
    }
}

impl NotificationSubscriber for InMemoryNotificationBus {
    fn subscribe(&self, topic: Topic, group: &str, handler: Arc<dyn NotificationHandler>) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let topic_groups = groups.entry(topic).or_default();

        match topic_groups.iter_mut().find(|g| g.name == group) {
            Some(existing) => existing.members.push(handler),
            None => topic_groups.push(ConsumerGroup {
                name: group.to_string(),
                members: vec![handler],
                cursor: AtomicUsize::new(0),
            }),
        }
    }
}
