//! Per-connection write path.
//!
//! A raw socket sink is not safe to share, so every connection gets one
//! unbounded queue and one writer task draining it. Anything that wants to
//! reach the client (the read loop, bus handlers, other participants'
//! loops) enqueues through the [`ChannelSink`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::messages::ServerFrame;
use crate::domain::consultation::Frame;
use crate::domain::foundation::ConnectionId;
use crate::ports::{DeliveryError, FrameSink};

/// `FrameSink` backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Frame>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its writer drains.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl FrameSink for ChannelSink {
    fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.tx.send(frame).map_err(|_| DeliveryError::Closed)
    }
}

/// Spawns the single writer for a socket.
///
/// The task ends when every sink clone is dropped (after sending a close
/// frame) or when a write fails.
pub fn spawn_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Frame>,
    connection_id: ConnectionId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match ServerFrame::from(&frame).to_json() {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, kind = frame.kind(), "Failed to encode frame: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json)).await {
                tracing::debug!(connection_id = %connection_id, "Send error, closing writer: {}", e);
                return;
            }
        }

        let _ = sender.send(Message::Close(None)).await;
        tracing::trace!(connection_id = %connection_id, "Writer finished");
    })
}
