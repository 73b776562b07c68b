//! Notification bus configuration

use serde::Deserialize;
use uuid::Uuid;

use super::error::ValidationError;
use crate::adapters::notifications::StreamSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub backend: NotificationBackend,

    /// Prefix of the per-topic stream keys (`{prefix}:{topic}`)
    #[serde(default = "default_stream_prefix")]
    pub stream_prefix: String,

    /// Consumer group shared by every relay instance for review archiving.
    /// Draft delivery uses `delivery_group()` instead.
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// This instance's name inside the group; must differ per instance.
    /// Defaults to a random name so unconfigured instances never collide.
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    #[serde(default = "default_block_ms")]
    pub block_ms: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Approximate number of entries kept per stream
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

/// Which bus carries draft and review notifications.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationBackend {
    /// Direct callbacks inside one process
    #[default]
    InMemory,
    /// Redis Streams consumer groups across processes
    Redis,
}

impl NotificationsConfig {
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            stream_prefix: self.stream_prefix.clone(),
            consumer_name: self.consumer_name.clone(),
            block_ms: self.block_ms,
            batch_size: self.batch_size,
            max_len: self.max_len,
        }
    }

    /// Group this instance reads draft topics under.
    ///
    /// Sessions live in one process's registry, so every instance must see
    /// every draft notification and keep only those for sessions it holds.
    /// A group shared between instances would hand each draft to a single
    /// instance, usually not the one holding the doctor.
    pub fn delivery_group(&self) -> String {
        format!("{}-{}", self.consumer_group, self.consumer_name)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == NotificationBackend::InMemory {
            return Ok(());
        }
        if self.stream_prefix.is_empty() {
            return Err(ValidationError::InvalidStreamSettings("stream_prefix is empty"));
        }
        if self.consumer_group.is_empty() || self.consumer_name.is_empty() {
            return Err(ValidationError::InvalidStreamSettings(
                "consumer group and name are required",
            ));
        }
        if self.batch_size == 0 || self.max_len == 0 {
            return Err(ValidationError::InvalidStreamSettings(
                "batch_size and max_len must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            backend: NotificationBackend::default(),
            stream_prefix: default_stream_prefix(),
            consumer_group: default_consumer_group(),
            consumer_name: default_consumer_name(),
            block_ms: default_block_ms(),
            batch_size: default_batch_size(),
            max_len: default_max_len(),
        }
    }
}

fn default_stream_prefix() -> String {
    "medqa".to_string()
}

fn default_consumer_group() -> String {
    "medqa-relay".to_string()
}

fn default_consumer_name() -> String {
    format!("relay-{}", Uuid::new_v4().simple())
}

fn default_block_ms() -> usize {
    5000
}

fn default_batch_size() -> usize {
    16
}

fn default_max_len() -> usize {
    10_000
}
