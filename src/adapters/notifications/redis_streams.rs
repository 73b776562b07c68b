//! Redis Streams notification bus for multi-process deployments.
//!
//! One stream per topic (`{prefix}:{topic}`), one JSON field per entry:
//!
//! ```text
//! XADD medqa:draft-ready MAXLEN ~ 10000 * envelope {...}
//! XGROUP CREATE medqa:draft-ready relay-a $ MKSTREAM
//! XREADGROUP GROUP relay-a <consumer> COUNT 16 BLOCK 5000 STREAMS medqa:draft-ready >
//! XACK medqa:draft-ready relay-a <id>
//! ```
//!
//! Entries are acknowledged after their handler ran, whether it succeeded or
//! not: delivery is at-most-once per group.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{NotificationHandler, NotificationPublisher, NotificationSubscriber, Topic};

const ENVELOPE_FIELD: &str = "envelope";
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Stream naming and consumer tuning.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub stream_prefix: String,
    /// Name this process reads under inside every consumer group.
    pub consumer_name: String,
    pub block_ms: usize,
    pub batch_size: usize,
    /// Approximate cap on entries kept per stream.
    pub max_len: usize,
}

impl StreamSettings {
    fn stream_key(&self, topic: Topic) -> String {
        format!("{}:{}", self.stream_prefix, topic.as_str())
    }
}

/// Notification bus backed by Redis Streams consumer groups.
pub struct RedisNotificationBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
    settings: StreamSettings,
    shutdown: watch::Receiver<bool>,
}

impl RedisNotificationBus {
    /// Connects the publishing side. Consumers open their own connections
    /// because a blocking read would stall every other command on a shared one.
    pub async fn connect(
        client: redis::Client,
        settings: StreamSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, DomainError> {
        let publisher = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(redis_error)?;
        Ok(Self {
            client,
            publisher,
            settings,
            shutdown,
        })
    }
}

fn redis_error(err: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::NotificationBusError, err.to_string())
}

#[async_trait]
impl NotificationPublisher for RedisNotificationBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let topic = Topic::for_event_type(&event.event_type).ok_or_else(|| {
            DomainError::new(
                ErrorCode::NotificationBusError,
                format!("No topic for event type '{}'", event.event_type),
            )
        })?;
        let key = self.settings.stream_key(topic);
        let body = serde_json::to_string(&event)?;

        let mut conn = self.publisher.clone();
        let entry_id: String = conn
            .xadd_maxlen(
                &key,
                StreamMaxlen::Approx(self.settings.max_len),
                "*",
                &[(ENVELOPE_FIELD, body)],
            )
            .await
            .map_err(|e| redis_error(e).with_detail("stream", key.clone()))?;

        debug!(stream = %key, entry_id = %entry_id, event_id = %event.event_id, "Published notification");
        Ok(())
    }
}

impl NotificationSubscriber for RedisNotificationBus {
    fn subscribe(&self, topic: Topic, group: &str, handler: Arc<dyn NotificationHandler>) {
        let consumer = StreamConsumer {
            client: self.client.clone(),
            stream: self.settings.stream_key(topic),
            group: group.to_string(),
            settings: self.settings.clone(),
            handler,
        };
        tokio::spawn(consumer.run(self.shutdown.clone()));
    }
}

/// One consumer-group reader for one stream.
struct StreamConsumer {
    client: redis::Client,
    stream: String,
    group: String,
    settings: StreamSettings,
    handler: Arc<dyn NotificationHandler>,
}

impl StreamConsumer {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            stream = %self.stream,
            group = %self.group,
            handler = self.handler.name(),
            "Starting stream consumer"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut conn = match self.prepare().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(stream = %self.stream, group = %self.group, error = %e, "Stream consumer setup failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                    }
                }
            };

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!(stream = %self.stream, group = %self.group, "Stream consumer stopping");
                        return;
                    }
                    result = self.poll(&mut conn) => {
                        if let Err(e) = result {
                            warn!(stream = %self.stream, group = %self.group, error = %e, "Stream read failed, reconnecting");
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }

        info!(stream = %self.stream, group = %self.group, "Stream consumer stopped");
    }

    /// Opens a dedicated connection and makes sure the group exists.
    async fn prepare(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_tokio_connection().await?;
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(&self.stream, &self.group, "$")
            .await;
        match created {
            Ok(()) => debug!(stream = %self.stream, group = %self.group, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => return Err(e),
        }
        Ok(conn)
    }

    /// Reads one batch, handles it and acknowledges it.
    async fn poll(&self, conn: &mut MultiplexedConnection) -> Result<(), redis::RedisError> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.settings.consumer_name)
            .count(self.settings.batch_size)
            .block(self.settings.block_ms);

        let reply: StreamReadReply = conn
            .xread_options(&[&self.stream], &[">"], &options)
            .await?;

        for key in reply.keys {
            for entry in key.ids {
                match decode_entry(&entry) {
                    Ok(envelope) => {
                        if let Err(e) = self.handler.handle(envelope).await {
                            warn!(
                                stream = %self.stream,
                                entry_id = %entry.id,
                                handler = self.handler.name(),
                                error = %e,
                                "Notification handler failed"
                            );
                        }
                    }
                    Err(e) => {
                        warn!(stream = %self.stream, entry_id = %entry.id, error = %e, "Skipping undecodable stream entry");
                    }
                }
                let _: i64 = conn.xack(&self.stream, &self.group, &[&entry.id]).await?;
            }
        }
        Ok(())
    }
}

fn decode_entry(entry: &StreamId) -> Result<EventEnvelope, DomainError> {
    let body: String = entry.get(ENVELOPE_FIELD).ok_or_else(|| {
        DomainError::new(
            ErrorCode::SerializationFailed,
            format!("entry has no '{}' field", ENVELOPE_FIELD),
        )
    })?;
    Ok(serde_json::from_str(&body)?)
}
