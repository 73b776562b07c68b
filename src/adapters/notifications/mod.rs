//! Notification bus adapters.
//!
//! - [`InMemoryNotificationBus`] - direct callbacks, single process
//! - [`RedisNotificationBus`] - Redis Streams consumer groups, many processes

mod in_memory;
mod redis_streams;

pub use in_memory::InMemoryNotificationBus;
pub use redis_streams::{RedisNotificationBus, StreamSettings};
