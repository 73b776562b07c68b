//! WebSocket upgrade handler for consultation connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Parse the handshake (`role`, `session`, `token` query parameters)
//! 2. Start a session (patient) or join one (doctor)
//! 3. Read frames until the client goes away
//! 4. Release the connection's slot

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::connection::{spawn_writer, ChannelSink};
use super::messages::{ClientMessage, InboundFrame};
use crate::application::SessionOrchestrator;
use crate::domain::consultation::{ConsultationError, Frame, Role};
use crate::domain::foundation::SessionId;
use crate::ports::Connection;

/// How long a closing connection waits for queued frames to flush.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub orchestrator: Arc<SessionOrchestrator>,
}

impl WebSocketState {
    pub fn new(orchestrator: Arc<SessionOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Query parameters of the upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    pub role: Option<String>,
    pub session: Option<String>,
    pub token: Option<String>,
}

/// What a connecting client asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// A patient opening a new session.
    Patient,
    /// A doctor joining an existing session.
    Doctor { session_id: SessionId, token: String },
}

impl Handshake {
    pub fn parse(params: &ConnectParams) -> Result<Self, ConsultationError> {
        let role: Role = params
            .role
            .as_deref()
            .ok_or_else(|| ConsultationError::invalid_handshake("missing role"))?
            .parse()
            .map_err(|_| ConsultationError::invalid_handshake("role must be patient or doctor"))?;

        match role {
            Role::Patient => match params.session {
                Some(_) => Err(ConsultationError::invalid_handshake(
                    "patients cannot attach to an existing session",
                )),
                None => Ok(Handshake::Patient),
            },
            Role::Doctor => {
                let raw = params
                    .session
                    .as_deref()
                    .ok_or_else(|| ConsultationError::invalid_handshake("doctor must name a session"))?;
                let session_id = raw.parse().map_err(|_| {
                    ConsultationError::invalid_handshake(format!("invalid session id '{}'", raw))
                })?;
                let token = params
                    .token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or(ConsultationError::InvalidToken)?;
                Ok(Handshake::Doctor { session_id, token })
            }
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Handshake::Patient => Role::Patient,
            Handshake::Doctor { .. } => Role::Doctor,
        }
    }
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?role=patient|doctor&session=<id>&token=<token>`
///
/// Handshake problems are reported in-band: the socket is upgraded, an
/// ERROR frame is sent and the socket is closed.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<WebSocketState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn handle_socket(socket: WebSocket, params: ConnectParams, state: WebSocketState) {
    let (sender, receiver) = socket.split();
    let (sink, rx) = ChannelSink::channel();

    let handshake = Handshake::parse(&params);
    let role = handshake.as_ref().map(Handshake::role).unwrap_or(Role::Patient);
    let connection = Connection::new(role, sink);
    let writer = spawn_writer(sender, rx, connection.id());

    let orchestrator = state.orchestrator;
    let joined = match handshake {
        Ok(Handshake::Patient) => orchestrator.start_session(connection.clone()).await,
        Ok(Handshake::Doctor { session_id, token }) => orchestrator
            .join_session(session_id, connection.clone(), &token)
            .await
            .map(|session| session.id()),
        Err(e) => Err(e),
    };

    match joined {
        Ok(session_id) => {
            tracing::debug!(session_id = %session_id, connection_id = %connection.id(), role = %role, "Connection established");
            read_frames(&orchestrator, session_id, &connection, receiver).await;
        }
        Err(e) => {
            tracing::info!(connection_id = %connection.id(), role = %role, code = e.code(), "Handshake rejected: {}", e);
            if let Err(send_err) = connection.send(Frame::error(None, &e)) {
                tracing::debug!(connection_id = %connection.id(), error = %send_err, "Could not report handshake rejection");
            }
        }
    }

    drop(connection);
    finish(writer).await;
}

/// Serves one bound connection until the client goes away, then releases
/// its slot in the session.
///
/// A frame that fails is answered with an ERROR frame. The loop keeps going
/// unless the error is fatal to the connection or the ERROR frame itself
/// could not be sent.
async fn read_frames<S>(
    orchestrator: &SessionOrchestrator,
    session_id: SessionId,
    connection: &Connection,
    mut receiver: S,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(result) = receiver.next().await {
        let outcome = match result {
            Ok(Message::Text(text)) => dispatch(orchestrator, session_id, connection, &text).await,
            Ok(Message::Binary(_)) => Err(ConsultationError::malformed_frame(
                "binary frames are not supported",
            )),
            Ok(Message::Close(_)) => {
                tracing::debug!(session_id = %session_id, connection_id = %connection.id(), "Client sent close frame");
                break;
            }
            // WebSocket protocol ping/pong - handled automatically by axum
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::debug!(session_id = %session_id, connection_id = %connection.id(), "Receive error: {}", e);
                break;
            }
        };

        if let Err(e) = outcome {
            tracing::debug!(session_id = %session_id, connection_id = %connection.id(), code = e.code(), "Frame failed: {}", e);
            if connection.send(Frame::error(Some(session_id), &e)).is_err() || e.is_fatal_to_connection() {
                break;
            }
        }
    }

    orchestrator
        .handle_disconnect(session_id, connection.role(), connection.id())
        .await;
}

/// Maps one inbound text frame onto the orchestrator.
async fn dispatch(
    orchestrator: &SessionOrchestrator,
    session_id: SessionId,
    connection: &Connection,
    text: &str,
) -> Result<(), ConsultationError> {
    match InboundFrame::parse(text)?.into_client_message(session_id)? {
        ClientMessage::Ping => connection
            .send(Frame::Pong)
            .map_err(|e| ConsultationError::transport(e.to_string())),
        ClientMessage::Message { content } => {
            orchestrator
                .handle_message(session_id, connection.role(), content)
                .await
        }
        ClientMessage::Review(command) => {
            if connection.role() != Role::Doctor {
                return Err(ConsultationError::not_permitted(connection.role(), "review drafts"));
            }
            orchestrator
                .handle_review(session_id, connection.id(), command)
                .await
                .map(|_| ())
        }
    }
}

/// Waits for the writer to flush; it stops once the last sink is dropped.
async fn finish(writer: tokio::task::JoinHandle<()>) {
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::debug!("Writer did not drain in time");
    }
}

/// Liveness document for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub live_sessions: usize,
}

pub async fn health_handler(State(state): State<WebSocketState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        live_sessions: state.orchestrator.live_sessions().await,
    })
}

/// Create axum router for the WebSocket and health endpoints.
///
/// # Example
///
/// ```ignore
/// let app = websocket_router().with_state(WebSocketState::new(orchestrator));
/// ```
pub fn websocket_router() -> Router<WebSocketState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
}
