//! WebSocket transport for consultation chats.
//!
//! # Architecture
//!
//! ```text
//!  client ──► read loop ──► SessionOrchestrator ──► ConnectionRegistry
//!                                                        │
//!  client ◄── writer task ◄── ChannelSink ◄──────────────┘
//! ```
//!
//! Each connection has exactly one read loop and one writer task. Frames
//! from anywhere in the process reach the socket only through the
//! connection's [`ChannelSink`].
//!
//! # Components
//!
//! - [`messages`] - wire protocol types
//! - [`connection`] - channel-backed sink and writer task
//! - [`handler`] - Axum upgrade handler, read loop and router

pub mod connection;
pub mod handler;
pub mod messages;

pub use connection::{spawn_writer, ChannelSink};
pub use handler::{
    health_handler, websocket_router, ws_handler, ConnectParams, Handshake, HealthStatus,
    WebSocketState,
};
pub use messages::{ClientMessage, InboundFrame, InboundKind, ServerFrame};
