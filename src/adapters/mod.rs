//! Adapters - Implementations of port interfaces.
//!
//! - `registry` - In-process connection registry
//! - `notifications` - Notification bus (in-memory, Redis Streams)
//! - `ai` - Draft generators and LLM providers
//! - `auth` - Doctor token validators
//! - `context` - Patient context providers
//! - `archive` - PostgreSQL consultation archive
//! - `websocket` - axum WebSocket transport

pub mod ai;
pub mod archive;
pub mod auth;
pub mod context;
pub mod notifications;
pub mod registry;
pub mod websocket;
