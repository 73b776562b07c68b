//! SessionOrchestrator - the consultation state machine's entry points.
//!
//! Transports call into the orchestrator with already-parsed requests; the
//! orchestrator mutates sessions through the registry, routes frames by role
//! and hands patient questions to the draft pipeline.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::DraftPipeline;
use crate::domain::consultation::{
    ChatMessage, ConsultationError, Frame, ReviewAction, ReviewDecision, ReviewDone,
    ReviewOutcome, Role, Session, SessionStatus, DOCTOR_JOINED_NOTICE, DOCTOR_LEFT_NOTICE,
    DOCTOR_REVIEWING_NOTICE, PATIENT_LEFT_NOTICE, RESPONSE_REJECTED_NOTICE,
};
use crate::domain::foundation::{ConnectionId, DraftId, SerializableDomainEvent, SessionId};
use crate::ports::{
    Connection, ConnectionRegistry, DoctorTokenValidator, DraftPolicy, NotificationPublisher,
};

/// A doctor's review as received from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCommand {
    pub action: ReviewAction,
    pub content: Option<String>,
    pub draft_id: Option<DraftId>,
}

pub struct SessionOrchestrator {
    registry: Arc<dyn ConnectionRegistry>,
    tokens: Arc<dyn DoctorTokenValidator>,
    pipeline: DraftPipeline,
    publisher: Arc<dyn NotificationPublisher>,
    policy: DraftPolicy,
}

impl SessionOrchestrator {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        tokens: Arc<dyn DoctorTokenValidator>,
        pipeline: DraftPipeline,
        publisher: Arc<dyn NotificationPublisher>,
        policy: DraftPolicy,
    ) -> Self {
        Self {
            registry,
            tokens,
            pipeline,
            publisher,
            policy,
        }
    }

    pub fn draft_policy(&self) -> DraftPolicy {
        self.policy
    }

    /// Opens a session for a patient and tells them its id.
    pub async fn start_session(&self, patient: Connection) -> Result<SessionId, ConsultationError> {
        if patient.role() != Role::Patient {
            return Err(ConsultationError::not_permitted(patient.role(), "start a session"));
        }

        let patient_id = patient.id();
        let session = self.registry.open_session(patient).await?;
        let session_id = session.id();

        if !self
            .registry
            .deliver(session_id, Role::Patient, Frame::SessionStarted { session_id })
            .await?
        {
            self.registry.close_session(session_id, patient_id).await;
            return Err(ConsultationError::transport("patient connection closed during start"));
        }
        info!(session_id = %session_id, "Consultation session started");
        Ok(session_id)
    }

    /// Binds a doctor to a waiting session.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the token check fails
    /// - `SessionNotFound` if the session does not exist
    /// - `DoctorSlotOccupied` if another doctor is bound
    pub async fn join_session(
        &self,
        session_id: SessionId,
        doctor: Connection,
        token: &str,
    ) -> Result<Session, ConsultationError> {
        if doctor.role() != Role::Doctor {
            return Err(ConsultationError::not_permitted(doctor.role(), "join as doctor"));
        }
        if !self.tokens.is_valid(token).await {
            warn!(session_id = %session_id, "Doctor join rejected: invalid token");
            return Err(ConsultationError::InvalidToken);
        }

        let connection_id = doctor.id();
        let session = self
            .registry
            .bind_doctor(session_id, doctor, self.policy.buffer_when_unattended)
            .await?;
        info!(session_id = %session_id, connection_id = %connection_id, "Doctor joined session");

        let notice = Frame::Message(ChatMessage::system(session_id, DOCTOR_JOINED_NOTICE));
        for role in [Role::Patient, Role::Doctor] {
            self.registry.deliver(session_id, role, notice.clone()).await?;
        }
        Ok(session)
    }

    /// Forwards a participant's message to the other side.
    ///
    /// Patient messages also show a progress notice to the patient and start
    /// an asynchronous draft; the draft reaches the doctor later through the
    /// notification bus.
    pub async fn handle_message(
        &self,
        session_id: SessionId,
        sender: Role,
        content: impl Into<String>,
    ) -> Result<(), ConsultationError> {
        if self.registry.snapshot(session_id).await.is_none() {
            return Err(ConsultationError::SessionNotFound(session_id));
        }

        let message = ChatMessage::from_participant(session_id, sender, content);
        let message_id = message.id;
        let question = message.content.clone();

        let forwarded = self
            .registry
            .deliver(session_id, sender.counterpart(), Frame::Message(message))
            .await?;
        if !forwarded {
            debug!(session_id = %session_id, sender = %sender, "No peer bound, message not forwarded");
        }

        if sender == Role::Patient {
            self.registry
                .deliver(
                    session_id,
                    Role::Patient,
                    Frame::Message(ChatMessage::system(session_id, DOCTOR_REVIEWING_NOTICE)),
                )
                .await?;
            self.pipeline.request(session_id, message_id, question);
        }
        Ok(())
    }

    /// Applies a doctor's review to the session's pending draft.
    ///
    /// APPROVE and MODIFY deliver exactly one doctor-authored message to the
    /// patient. REJECT delivers nothing to the patient and notifies only the
    /// reviewing connection.
    pub async fn handle_review(
        &self,
        session_id: SessionId,
        reviewer: ConnectionId,
        command: ReviewCommand,
    ) -> Result<ReviewOutcome, ConsultationError> {
        let session = self
            .registry
            .snapshot(session_id)
            .await
            .ok_or(ConsultationError::SessionNotFound(session_id))?;
        if session.doctor() != Some(reviewer) {
            return Err(ConsultationError::not_permitted(
                Role::Doctor,
                "review drafts in a session they are not bound to",
            ));
        }

        let decision = ReviewDecision::new(
            session_id,
            reviewer,
            command.action,
            command.content,
            command.draft_id,
        )?;
        let draft = self.registry.take_draft(session_id, decision.draft_id()).await?;
        let outcome = decision.resolve(draft)?;

        match &outcome {
            ReviewOutcome::Deliver { content, .. } => {
                let answer = ChatMessage::from_participant(session_id, Role::Doctor, content.clone());
                if !self
                    .registry
                    .deliver(session_id, Role::Patient, Frame::Message(answer))
                    .await?
                {
                    warn!(session_id = %session_id, "Reviewed answer could not reach the patient");
                }
            }
            ReviewOutcome::Rejected { .. } => {
                let notice = ChatMessage::system(session_id, RESPONSE_REJECTED_NOTICE);
                self.registry
                    .deliver_to_connection(session_id, reviewer, Frame::Message(notice))
                    .await?;
            }
        }

        info!(
            session_id = %session_id,
            action = decision.action().as_str(),
            "Review applied"
        );
        self.publish_review(&decision, &outcome).await;
        Ok(outcome)
    }

    /// Releases a connection's slot. Safe to call more than once.
    ///
    /// A departing patient ends the session; a departing doctor only frees
    /// the doctor slot so another doctor can join.
    pub async fn handle_disconnect(
        &self,
        session_id: SessionId,
        role: Role,
        connection_id: ConnectionId,
    ) {
        match role {
            Role::Patient => {
                let Some(closed) = self.registry.close_session(session_id, connection_id).await
                else {
                    debug!(session_id = %session_id, "Session already closed");
                    return;
                };
                info!(session_id = %session_id, "Patient left, session closed");

                let notice = Frame::Message(ChatMessage::system(session_id, PATIENT_LEFT_NOTICE));
                for connection in closed.remaining {
                    if let Err(e) = connection.send(notice.clone()) {
                        debug!(
                            session_id = %session_id,
                            connection_id = %connection.id(),
                            error = %e,
                            "Could not notify participant of session end"
                        );
                    }
                }
            }
            Role::Doctor => {
                if !self
                    .registry
                    .unbind_doctor(session_id, connection_id, self.policy.buffer_when_unattended)
                    .await
                {
                    debug!(session_id = %session_id, connection_id = %connection_id, "Doctor was not bound");
                    return;
                }
                info!(session_id = %session_id, "Doctor left, session awaiting doctor");

                let notice = Frame::Message(ChatMessage::system(session_id, DOCTOR_LEFT_NOTICE));
                if let Err(e) = self.registry.deliver(session_id, Role::Patient, notice).await {
                    debug!(session_id = %session_id, error = %e, "Could not notify patient of doctor departure");
                }
            }
        }
    }

    /// Lifecycle state of a live session.
    pub async fn session_status(&self, session_id: SessionId) -> Option<SessionStatus> {
        self.registry.snapshot(session_id).await.map(|s| s.status())
    }

    pub async fn live_sessions(&self) -> usize {
        self.registry.session_count().await
    }

    async fn publish_review(&self, decision: &ReviewDecision, outcome: &ReviewOutcome) {
        let envelope = match ReviewDone::from_outcome(decision, outcome).to_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session_id = %decision.session_id(), error = %e, "Failed to serialize review notification");
                return;
            }
        };
        if let Err(e) = self.publisher.publish(envelope).await {
            warn!(session_id = %decision.session_id(), error = %e, "Failed to publish review notification");
        }
    }
}
