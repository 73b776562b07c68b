//! ConnectionRegistry port - live participant connections keyed by session.
//!
//! The registry is the only shared mutable state of the relay. It owns the
//! `Session` aggregates together with the transport handles bound to their
//! slots, so every slot change and every role-addressed delivery happens
//! under that session's own lock.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::domain::consultation::{AIDraft, ConsultationError, Frame, Role, Session};
use crate::domain::foundation::{ConnectionId, DraftId, SessionId};

/// Errors writing a frame to one connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Write side of one client connection.
///
/// `deliver` must not block: implementations enqueue the frame for a
/// dedicated writer so concurrent callers never touch the socket directly.
pub trait FrameSink: Send + Sync {
    fn deliver(&self, frame: Frame) -> Result<(), DeliveryError>;
}

/// A live transport connection tagged with its role.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    role: Role,
    sink: Arc<dyn FrameSink>,
}

impl Connection {
    pub fn new(role: Role, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id: ConnectionId::new(),
            role,
            sink,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Writes a frame to this connection.
    ///
    /// Drafts are refused for anything but a doctor connection.
    pub fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        if frame.is_draft() && self.role != Role::Doctor {
            return Err(DeliveryError::Failed(format!(
                "draft frames are not deliverable to {} connections",
                self.role
            )));
        }
        self.sink.deliver(frame)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}

/// Drafting policy applied when a draft is offered to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftPolicy {
    /// Maximum drafts kept per session for later review.
    pub max_pending: usize,
    /// Keep drafts that arrive while no doctor is bound.
    pub buffer_when_unattended: bool,
}

/// What happened to an offered draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftDisposition {
    /// Written to the bound doctor and kept for review.
    Delivered,
    /// No doctor bound; kept for the next one.
    Buffered,
    /// No doctor bound and buffering is off.
    DroppedUnattended,
    /// The session no longer exists.
    DroppedSessionGone,
    /// A doctor is bound but the write failed.
    DeliveryFailed,
}

/// Result of closing a session.
#[derive(Debug, Clone)]
pub struct ClosedSession {
    /// Final state of the session, already `Closed`.
    pub session: Session,
    /// Connections other than the patient that were still bound.
    pub remaining: Vec<Connection>,
}

/// Port for the live session table.
///
/// Operations on one session are atomic with respect to each other; operations
/// on different sessions never block each other. Delivery to a session that
/// was just removed is a no-op.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Opens a new session with `patient` in the patient slot.
    async fn open_session(&self, patient: Connection) -> Result<Session, ConsultationError>;

    /// Binds a doctor to an existing session.
    ///
    /// When `replay_pending` is set, drafts already kept on the session are
    /// written to the new doctor before the call returns.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if no live session has this id
    /// - `DoctorSlotOccupied` if a doctor is already bound
    async fn bind_doctor(
        &self,
        session_id: SessionId,
        doctor: Connection,
        replay_pending: bool,
    ) -> Result<Session, ConsultationError>;

    /// Clears the doctor slot if `connection_id` holds it.
    ///
    /// Returns false when the session is gone or another connection holds
    /// the slot. Pending drafts are discarded unless `retain_drafts` is set.
    async fn unbind_doctor(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
        retain_drafts: bool,
    ) -> bool;

    /// Removes the session if `connection_id` is its patient.
    ///
    /// Only the first call for a session returns `Some`.
    async fn close_session(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
    ) -> Option<ClosedSession>;

    /// Writes a frame to whichever connection holds `role` in the session.
    ///
    /// Returns `Ok(false)` if nobody holds the slot, the session is gone or
    /// the write failed (failures are logged).
    ///
    /// # Errors
    ///
    /// - `NotPermitted` if a draft frame is addressed to the patient
    async fn deliver(
        &self,
        session_id: SessionId,
        role: Role,
        frame: Frame,
    ) -> Result<bool, ConsultationError>;

    /// Writes a frame to one specific connection of the session.
    async fn deliver_to_connection(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
        frame: Frame,
    ) -> Result<bool, ConsultationError>;

    /// Hands a generated draft to the session's doctor according to `policy`.
    async fn offer_draft(&self, draft: AIDraft, policy: DraftPolicy) -> DraftDisposition;

    /// Removes a kept draft for review. `None` takes the most recent one.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if no live session has this id
    async fn take_draft(
        &self,
        session_id: SessionId,
        draft_id: Option<DraftId>,
    ) -> Result<Option<AIDraft>, ConsultationError>;

    /// Copy of the session's current state.
    async fn snapshot(&self, session_id: SessionId) -> Option<Session>;

    /// Number of live sessions.
    async fn session_count(&self) -> usize;
}
