//! In-memory connection registry.
//!
//! # Locking
//!
//! ```text
//! sessions: RwLock<HashMap<SessionId, Arc<RwLock<SessionEntry>>>>
//!            │                          │
//!            │ held only to look up,    └─ per-session lock: slot changes take
//!            │ insert or remove            it exclusively, deliveries share it
//! ```
//!
//! The outer lock is never held across an await on an entry lock, so work on
//! one session never waits for another session.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::consultation::{AIDraft, ConsultationError, Frame, Role, Session};
use crate::domain::foundation::{ConnectionId, DraftId, SessionId};
use crate::ports::{
    ClosedSession, Connection, ConnectionRegistry, DraftDisposition, DraftPolicy,
};

struct SessionEntry {
    session: Session,
    patient: Option<Connection>,
    doctor: Option<Connection>,
}

impl SessionEntry {
    fn connection(&self, role: Role) -> Option<&Connection> {
        match role {
            Role::Patient => self.patient.as_ref(),
            Role::Doctor => self.doctor.as_ref(),
        }
    }
}

/// Session table held in process memory.
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<RwLock<SessionEntry>>>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, session_id: SessionId) -> Option<Arc<RwLock<SessionEntry>>> {
        self.sessions.read().await.get(&session_id).cloned()
    }
}

/// Writes to one connection, logging failures instead of propagating them.
fn write(session_id: SessionId, connection: &Connection, frame: Frame) -> bool {
    let kind = frame.kind();
    match connection.send(frame) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                session_id = %session_id,
                connection_id = %connection.id(),
                role = %connection.role(),
                frame = kind,
                error = %e,
                "Failed to write frame"
            );
            false
        }
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn open_session(&self, patient: Connection) -> Result<Session, ConsultationError> {
        if patient.role() != Role::Patient {
            return Err(ConsultationError::not_permitted(patient.role(), "start a session"));
        }

        let session = Session::open(patient.id());
        let snapshot = session.clone();
        let entry = SessionEntry {
            session,
            patient: Some(patient),
            doctor: None,
        };
        self.sessions
            .write()
            .await
            .insert(snapshot.id(), Arc::new(RwLock::new(entry)));

        debug!(session_id = %snapshot.id(), "Session opened");
        Ok(snapshot)
    }

    async fn bind_doctor(
        &self,
        session_id: SessionId,
        doctor: Connection,
        replay_pending: bool,
    ) -> Result<Session, ConsultationError> {
        if doctor.role() != Role::Doctor {
            return Err(ConsultationError::not_permitted(doctor.role(), "join as doctor"));
        }

        let entry = self
            .entry(session_id)
            .await
            .ok_or(ConsultationError::SessionNotFound(session_id))?;
        let mut entry = entry.write().await;

        entry.session.attach_doctor(doctor.id())?;

        if replay_pending {
            for draft in entry.session.pending_drafts() {
                write(session_id, &doctor, Frame::DraftReady(draft.clone()));
            }
        }
        entry.doctor = Some(doctor);

        Ok(entry.session.clone())
    }

    async fn unbind_doctor(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
        retain_drafts: bool,
    ) -> bool {
        let Some(entry) = self.entry(session_id).await else {
            return false;
        };
        let mut entry = entry.write().await;

        if !entry.session.detach_doctor(connection_id) {
            return false;
        }
        entry.doctor = None;
        if !retain_drafts {
            entry.session.discard_drafts();
        }
        true
    }

    async fn close_session(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
    ) -> Option<ClosedSession> {
        let entry = self.entry(session_id).await?;
        let mut guard = entry.write().await;

        if !guard.session.close(connection_id) {
            return None;
        }
        guard.patient = None;
        let remaining: Vec<Connection> = guard.doctor.take().into_iter().collect();
        let session = guard.session.clone();
        drop(guard);

        let mut sessions = self.sessions.write().await;
        if sessions
            .get(&session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry))
        {
            sessions.remove(&session_id);
        }

        debug!(session_id = %session_id, "Session closed");
        Some(ClosedSession { session, remaining })
    }

    async fn deliver(
        &self,
        session_id: SessionId,
        role: Role,
        frame: Frame,
    ) -> Result<bool, ConsultationError> {
        if frame.is_draft() && role != Role::Doctor {
            return Err(ConsultationError::not_permitted(role, "receive drafts"));
        }

        let Some(entry) = self.entry(session_id).await else {
            return Ok(false);
        };
        let entry = entry.read().await;

        Ok(match entry.connection(role) {
            Some(connection) => write(session_id, connection, frame),
            None => false,
        })
    }

    async fn deliver_to_connection(
        &self,
        session_id: SessionId,
        connection_id: ConnectionId,
        frame: Frame,
    ) -> Result<bool, ConsultationError> {
        let Some(entry) = self.entry(session_id).await else {
            return Ok(false);
        };
        let entry = entry.read().await;

        let target = [entry.patient.as_ref(), entry.doctor.as_ref()]
            .into_iter()
            .flatten()
            .find(|c| c.id() == connection_id);

        match target {
            Some(connection) if frame.is_draft() && connection.role() != Role::Doctor => Err(
                ConsultationError::not_permitted(connection.role(), "receive drafts"),
            ),
            Some(connection) => Ok(write(session_id, connection, frame)),
            None => Ok(false),
        }
    }

    async fn offer_draft(&self, draft: AIDraft, policy: DraftPolicy) -> DraftDisposition {
        let session_id = draft.session_id;
        let Some(entry) = self.entry(session_id).await else {
            return DraftDisposition::DroppedSessionGone;
        };
        let mut entry = entry.write().await;

        if entry.session.is_closed() {
            return DraftDisposition::DroppedSessionGone;
        }

        match entry.doctor.clone() {
            Some(doctor) => {
                let delivered = write(session_id, &doctor, Frame::DraftReady(draft.clone()));
                if !delivered {
                    return DraftDisposition::DeliveryFailed;
                }
                if let Some(evicted) = entry.session.record_draft(draft, policy.max_pending) {
                    debug!(session_id = %session_id, draft_id = %evicted.draft_id, "Evicted oldest pending draft");
                }
                DraftDisposition::Delivered
            }
            None if policy.buffer_when_unattended => {
                if let Some(evicted) = entry.session.record_draft(draft, policy.max_pending) {
                    debug!(session_id = %session_id, draft_id = %evicted.draft_id, "Evicted oldest pending draft");
                }
                DraftDisposition::Buffered
            }
            None => DraftDisposition::DroppedUnattended,
        }
    }

    async fn take_draft(
        &self,
        session_id: SessionId,
        draft_id: Option<DraftId>,
    ) -> Result<Option<AIDraft>, ConsultationError> {
        let entry = self
            .entry(session_id)
            .await
            .ok_or(ConsultationError::SessionNotFound(session_id))?;
        let mut entry = entry.write().await;
        if entry.session.is_closed() {
            return Err(ConsultationError::SessionNotFound(session_id));
        }
        Ok(entry.session.take_draft(draft_id))
    }

    async fn snapshot(&self, session_id: SessionId) -> Option<Session> {
        let entry = self.entry(session_id).await?;
        let entry = entry.read().await;
        if entry.session.is_closed() {
            return None;
        }
        Some(entry.session.clone())
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consultation::{
        ChatMessage, Confidence, DraftRequest, PatientContext, SessionStatus,
    };
    use crate::domain::foundation::MessageId;
    use crate::ports::{DeliveryError, FrameSink};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<Frame>>,
        broken: bool,
    }

    impl RecordingSink {
        fn broken() -> Self {
            Self {
                frames: Mutex::new(Vec::new()),
                broken: true,
            }
        }

        fn frames(&self) -> Vec<Frame> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl FrameSink for RecordingSink {
        fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
            if self.broken {
                return Err(DeliveryError::Closed);
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    fn connection(role: Role) -> (Connection, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (Connection::new(role, sink.clone()), sink)
    }

    fn draft(session_id: SessionId, content: &str) -> AIDraft {
        let request =
            DraftRequest::new(session_id, MessageId::new(), "q", PatientContext::default());
        AIDraft::for_request(&request, content, Confidence::clamped(0.8), vec![])
    }

    const DROP: DraftPolicy = DraftPolicy {
        max_pending: 4,
        buffer_when_unattended: false,
    };
    const BUFFER: DraftPolicy = DraftPolicy {
        max_pending: 4,
        buffer_when_unattended: true,
    };

    #[tokio::test]
    async fn open_session_registers_patient() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient.clone()).await.unwrap();

        assert_eq!(session.patient(), Some(patient.id()));
        assert_eq!(registry.session_count().await, 1);
        assert!(registry.snapshot(session.id()).await.is_some());
    }

    #[tokio::test]
    async fn doctor_cannot_open_session() {
        let registry = InMemoryConnectionRegistry::new();
        let (doctor, _) = connection(Role::Doctor);
        assert!(matches!(
            registry.open_session(doctor).await,
            Err(ConsultationError::NotPermitted { .. })
        ));
    }

    #[tokio::test]
    async fn bind_doctor_to_unknown_session_fails() {
        let registry = InMemoryConnectionRegistry::new();
        let (doctor, _) = connection(Role::Doctor);
        let id = SessionId::new();
        assert_eq!(
            registry.bind_doctor(id, doctor, false).await.unwrap_err(),
            ConsultationError::SessionNotFound(id)
        );
    }

    #[tokio::test]
    async fn second_doctor_gets_slot_occupied() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();
        let (first, _) = connection(Role::Doctor);
        let (second, _) = connection(Role::Doctor);

        registry.bind_doctor(session.id(), first.clone(), false).await.unwrap();
        let err = registry.bind_doctor(session.id(), second, false).await.unwrap_err();

        assert_eq!(err, ConsultationError::DoctorSlotOccupied(session.id()));
        let snapshot = registry.snapshot(session.id()).await.unwrap();
        assert_eq!(snapshot.doctor(), Some(first.id()));
    }

    #[tokio::test]
    async fn deliver_reaches_only_the_addressed_role() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, patient_sink) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();
        let (doctor, doctor_sink) = connection(Role::Doctor);
        registry.bind_doctor(session.id(), doctor, false).await.unwrap();

        let frame = Frame::Message(ChatMessage::system(session.id(), "hello"));
        assert!(registry.deliver(session.id(), Role::Doctor, frame).await.unwrap());

        assert_eq!(doctor_sink.frames().len(), 1);
        assert!(patient_sink.frames().is_empty());
    }

    #[tokio::test]
    async fn deliver_to_missing_session_is_noop() {
        let registry = InMemoryConnectionRegistry::new();
        let frame = Frame::Message(ChatMessage::system(SessionId::new(), "hello"));
        assert!(!registry.deliver(SessionId::new(), Role::Patient, frame).await.unwrap());
    }

    #[tokio::test]
    async fn drafts_are_never_addressed_to_patient() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, patient_sink) = connection(Role::Patient);
        let session = registry.open_session(patient.clone()).await.unwrap();

        let frame = Frame::DraftReady(draft(session.id(), "x"));
        assert!(registry.deliver(session.id(), Role::Patient, frame.clone()).await.is_err());
        assert!(registry
            .deliver_to_connection(session.id(), patient.id(), frame)
            .await
            .is_err());
        assert!(patient_sink.frames().is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_reported_as_not_delivered() {
        let registry = InMemoryConnectionRegistry::new();
        let patient = Connection::new(Role::Patient, Arc::new(RecordingSink::broken()));
        let session = registry.open_session(patient).await.unwrap();

        let frame = Frame::Message(ChatMessage::system(session.id(), "hello"));
        assert!(!registry.deliver(session.id(), Role::Patient, frame).await.unwrap());
    }

    #[tokio::test]
    async fn unbind_only_by_bound_doctor() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();
        let (doctor, _) = connection(Role::Doctor);
        registry.bind_doctor(session.id(), doctor.clone(), false).await.unwrap();

        assert!(!registry.unbind_doctor(session.id(), ConnectionId::new(), false).await);
        assert!(registry.unbind_doctor(session.id(), doctor.id(), false).await);
        assert!(!registry.unbind_doctor(session.id(), doctor.id(), false).await);

        let snapshot = registry.snapshot(session.id()).await.unwrap();
        assert_eq!(snapshot.status(), SessionStatus::AwaitingDoctor);
    }

    #[tokio::test]
    async fn close_session_is_idempotent_and_returns_doctor() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient.clone()).await.unwrap();
        let (doctor, _) = connection(Role::Doctor);
        registry.bind_doctor(session.id(), doctor.clone(), false).await.unwrap();

        let closed = registry.close_session(session.id(), patient.id()).await.unwrap();
        assert_eq!(closed.session.status(), SessionStatus::Closed);
        assert_eq!(closed.remaining.len(), 1);
        assert_eq!(closed.remaining[0].id(), doctor.id());

        assert!(registry.close_session(session.id(), patient.id()).await.is_none());
        assert!(registry.snapshot(session.id()).await.is_none());
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn close_by_non_patient_is_ignored() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();

        assert!(registry.close_session(session.id(), ConnectionId::new()).await.is_none());
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn offer_draft_delivers_to_doctor_and_keeps_it() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, patient_sink) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();
        let (doctor, doctor_sink) = connection(Role::Doctor);
        registry.bind_doctor(session.id(), doctor, false).await.unwrap();

        let d = draft(session.id(), "Rest");
        assert_eq!(registry.offer_draft(d.clone(), DROP).await, DraftDisposition::Delivered);
        assert!(matches!(&doctor_sink.frames()[0], Frame::DraftReady(x) if x.draft_id == d.draft_id));
        assert!(patient_sink.frames().is_empty());

        let taken = registry.take_draft(session.id(), None).await.unwrap();
        assert_eq!(taken.map(|t| t.draft_id), Some(d.draft_id));
    }

    #[tokio::test]
    async fn offer_draft_without_doctor_drops_or_buffers() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();

        assert_eq!(
            registry.offer_draft(draft(session.id(), "a"), DROP).await,
            DraftDisposition::DroppedUnattended
        );
        assert_eq!(
            registry.offer_draft(draft(session.id(), "b"), BUFFER).await,
            DraftDisposition::Buffered
        );

        let (doctor, doctor_sink) = connection(Role::Doctor);
        registry.bind_doctor(session.id(), doctor, true).await.unwrap();
        let frames = doctor_sink.frames();
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], Frame::DraftReady(x) if x.content == "b"));
    }

    #[tokio::test]
    async fn offer_draft_for_gone_session_is_dropped() {
        let registry = InMemoryConnectionRegistry::new();
        assert_eq!(
            registry.offer_draft(draft(SessionId::new(), "x"), BUFFER).await,
            DraftDisposition::DroppedSessionGone
        );
    }

    #[tokio::test]
    async fn unbind_discards_drafts_unless_retained() {
        let registry = InMemoryConnectionRegistry::new();
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();
        let (doctor, _) = connection(Role::Doctor);
        registry.bind_doctor(session.id(), doctor.clone(), false).await.unwrap();
        registry.offer_draft(draft(session.id(), "a"), DROP).await;

        registry.unbind_doctor(session.id(), doctor.id(), false).await;
        assert_eq!(registry.take_draft(session.id(), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_joins_bind_exactly_one_doctor() {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let (patient, _) = connection(Role::Patient);
        let session = registry.open_session(patient).await.unwrap();
        let session_id = session.id();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let (doctor, _) = connection(Role::Doctor);
            handles.push(tokio::spawn(async move {
                registry.bind_doctor(session_id, doctor, false).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
