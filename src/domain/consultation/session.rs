//! Session aggregate.
//!
//! A session is one consultation: a patient slot, a doctor slot and the drafts
//! waiting for the doctor's review. Connections are referenced by id only;
//! the registry owns the transport handles.
//!
//! # Invariants
//!
//! - At most one patient and at most one doctor are bound at any time
//! - Only the bound connection can release its own slot
//! - A closed session never reopens

use serde::Serialize;
use std::collections::VecDeque;

use super::{AIDraft, ConsultationError, Role, SessionStatus};
use crate::domain::foundation::{ConnectionId, DraftId, SessionId, StateMachine, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    id: SessionId,
    created_at: Timestamp,
    status: SessionStatus,
    patient: Option<ConnectionId>,
    doctor: Option<ConnectionId>,
    pending_drafts: VecDeque<AIDraft>,
}

impl Session {
    /// Opens a new session with `patient` bound to the patient slot.
    pub fn open(patient: ConnectionId) -> Self {
        let mut session = Self {
            id: SessionId::new(),
            created_at: Timestamp::now(),
            status: SessionStatus::Created,
            patient: None,
            doctor: None,
            pending_drafts: VecDeque::new(),
        };
        session.patient = Some(patient);
        session.status = SessionStatus::AwaitingDoctor;
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn patient(&self) -> Option<ConnectionId> {
        self.patient
    }

    pub fn doctor(&self) -> Option<ConnectionId> {
        self.doctor
    }

    /// Connection bound to `role`, if any.
    pub fn connection_for(&self, role: Role) -> Option<ConnectionId> {
        match role {
            Role::Patient => self.patient,
            Role::Doctor => self.doctor,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Binds a doctor and moves the session to `Active`.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session is closed
    /// - `DoctorSlotOccupied` if a doctor is already attached
    pub fn attach_doctor(&mut self, conn: ConnectionId) -> Result<(), ConsultationError> {
        if self.is_closed() {
            return Err(ConsultationError::SessionNotFound(self.id));
        }
        if self.doctor.is_some() || !self.status.accepts_doctor() {
            return Err(ConsultationError::DoctorSlotOccupied(self.id));
        }
        self.status = self
            .status
            .transition_to(SessionStatus::Active)
            .map_err(|_| ConsultationError::DoctorSlotOccupied(self.id))?;
        self.doctor = Some(conn);
        Ok(())
    }

    /// Clears the doctor slot if `conn` holds it. Returns whether it did.
    pub fn detach_doctor(&mut self, conn: ConnectionId) -> bool {
        if self.doctor != Some(conn) {
            return false;
        }
        self.doctor = None;
        if let Ok(next) = self.status.transition_to(SessionStatus::AwaitingDoctor) {
            self.status = next;
        }
        true
    }

    /// Closes the session if `conn` is its patient. Closing twice is a no-op.
    ///
    /// Returns true only for the call that actually closed the session.
    pub fn close(&mut self, conn: ConnectionId) -> bool {
        if self.is_closed() || self.patient != Some(conn) {
            return false;
        }
        match self.status.transition_to(SessionStatus::Closed) {
            Ok(next) => self.status = next,
            Err(_) => return false,
        }
        self.patient = None;
        self.doctor = None;
        self.pending_drafts.clear();
        true
    }

    /// Keeps a draft for later review, holding at most `cap` drafts.
    ///
    /// Returns the draft that no longer fits: the oldest one when the queue
    /// overflows, or `draft` itself when the session is closed or `cap` is 0.
    pub fn record_draft(&mut self, draft: AIDraft, cap: usize) -> Option<AIDraft> {
        if self.is_closed() || cap == 0 {
            return Some(draft);
        }
        self.pending_drafts.push_back(draft);
        if self.pending_drafts.len() > cap {
            self.pending_drafts.pop_front()
        } else {
            None
        }
    }

    /// Removes a pending draft. `None` takes the most recent one.
    pub fn take_draft(&mut self, draft_id: Option<DraftId>) -> Option<AIDraft> {
        match draft_id {
            None => self.pending_drafts.pop_back(),
            Some(id) => {
                let index = self.pending_drafts.iter().position(|d| d.draft_id == id)?;
                self.pending_drafts.remove(index)
            }
        }
    }

    pub fn pending_drafts(&self) -> impl Iterator<Item = &AIDraft> {
        self.pending_drafts.iter()
    }

    pub fn pending_draft_count(&self) -> usize {
        self.pending_drafts.len()
    }

    pub fn discard_drafts(&mut self) {
        self.pending_drafts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consultation::{Confidence, DraftRequest, PatientContext};
    use crate::domain::foundation::MessageId;

    fn draft_for(session: &Session, content: &str) -> AIDraft {
        let request =
            DraftRequest::new(session.id(), MessageId::new(), "q", PatientContext::default());
        AIDraft::for_request(&request, content, Confidence::clamped(0.5), vec![])
    }

    #[test]
    fn open_binds_patient_and_awaits_doctor() {
        let patient = ConnectionId::new();
        let session = Session::open(patient);
        assert_eq!(session.patient(), Some(patient));
        assert_eq!(session.doctor(), None);
        assert_eq!(session.status(), SessionStatus::AwaitingDoctor);
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let a = Session::open(ConnectionId::new());
        let b = Session::open(ConnectionId::new());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn attach_doctor_activates_session() {
        let mut session = Session::open(ConnectionId::new());
        let doctor = ConnectionId::new();
        session.attach_doctor(doctor).unwrap();
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.connection_for(Role::Doctor), Some(doctor));
    }

    #[test]
    fn second_doctor_is_rejected_and_first_stays_bound() {
        let mut session = Session::open(ConnectionId::new());
        let first = ConnectionId::new();
        session.attach_doctor(first).unwrap();

        let err = session.attach_doctor(ConnectionId::new()).unwrap_err();
        assert_eq!(err, ConsultationError::DoctorSlotOccupied(session.id()));
        assert_eq!(session.doctor(), Some(first));
    }

    #[test]
    fn detach_only_by_bound_doctor() {
        let mut session = Session::open(ConnectionId::new());
        let doctor = ConnectionId::new();
        session.attach_doctor(doctor).unwrap();

        assert!(!session.detach_doctor(ConnectionId::new()));
        assert_eq!(session.status(), SessionStatus::Active);

        assert!(session.detach_doctor(doctor));
        assert_eq!(session.status(), SessionStatus::AwaitingDoctor);
        assert!(!session.detach_doctor(doctor));
    }

    #[test]
    fn another_doctor_can_join_after_detach() {
        let mut session = Session::open(ConnectionId::new());
        let first = ConnectionId::new();
        session.attach_doctor(first).unwrap();
        session.detach_doctor(first);

        let second = ConnectionId::new();
        session.attach_doctor(second).unwrap();
        assert_eq!(session.doctor(), Some(second));
    }

    #[test]
    fn close_is_idempotent_and_patient_only() {
        let patient = ConnectionId::new();
        let mut session = Session::open(patient);

        assert!(!session.close(ConnectionId::new()));
        assert!(session.close(patient));
        assert!(!session.close(patient));
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[test]
    fn closed_session_rejects_doctor() {
        let patient = ConnectionId::new();
        let mut session = Session::open(patient);
        session.close(patient);
        assert_eq!(
            session.attach_doctor(ConnectionId::new()),
            Err(ConsultationError::SessionNotFound(session.id()))
        );
    }

    #[test]
    fn record_draft_evicts_oldest_over_cap() {
        let mut session = Session::open(ConnectionId::new());
        let first = draft_for(&session, "one");
        assert!(session.record_draft(first.clone(), 2).is_none());
        assert!(session.record_draft(draft_for(&session, "two"), 2).is_none());

        let evicted = session.record_draft(draft_for(&session, "three"), 2);
        assert_eq!(evicted.map(|d| d.draft_id), Some(first.draft_id));
        assert_eq!(session.pending_draft_count(), 2);
    }

    #[test]
    fn record_draft_refused_when_closed_or_cap_zero() {
        let patient = ConnectionId::new();
        let mut session = Session::open(patient);
        assert!(session.record_draft(draft_for(&session, "x"), 0).is_some());
        session.close(patient);
        assert!(session.record_draft(draft_for(&session, "y"), 5).is_some());
        assert_eq!(session.pending_draft_count(), 0);
    }

    #[test]
    fn take_draft_by_id_or_most_recent() {
        let mut session = Session::open(ConnectionId::new());
        let a = draft_for(&session, "a");
        let b = draft_for(&session, "b");
        session.record_draft(a.clone(), 5);
        session.record_draft(b.clone(), 5);

        assert_eq!(session.take_draft(Some(a.draft_id)).map(|d| d.content), Some("a".into()));
        assert!(session.take_draft(Some(a.draft_id)).is_none());
        assert_eq!(session.take_draft(None).map(|d| d.content), Some("b".into()));
        assert!(session.take_draft(None).is_none());
    }
}
