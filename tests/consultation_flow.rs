//! End-to-end consultation flows through the orchestrator.
//!
//! Every participant is a `ChannelSink` whose receiver plays the client, so
//! the tests observe exactly the frames a socket writer would send. Drafts
//! travel through the in-memory bus to the delivery handler, as in a
//! single-process deployment.

use std::sync::Arc;
use std::time::Duration;

use secrecy::Secret;
use tokio::sync::mpsc::UnboundedReceiver;

use medqa_relay::adapters::ai::MockDraftGenerator;
use medqa_relay::adapters::auth::StaticTokenValidator;
use medqa_relay::adapters::context::StaticPatientContextProvider;
use medqa_relay::adapters::notifications::InMemoryNotificationBus;
use medqa_relay::adapters::registry::InMemoryConnectionRegistry;
use medqa_relay::adapters::websocket::ChannelSink;
use medqa_relay::application::{
    DraftDeliveryHandler, DraftPipeline, ReviewCommand, SessionOrchestrator,
};
use medqa_relay::domain::consultation::{
    AIDraft, ChatMessage, Confidence, ConsultationError, Frame, MessageAuthor, ReviewAction, ReviewDone,
    ReviewOutcome, Role, SessionStatus, DOCTOR_JOINED_NOTICE, DOCTOR_LEFT_NOTICE,
    DOCTOR_REVIEWING_NOTICE, PATIENT_LEFT_NOTICE, RESPONSE_REJECTED_NOTICE,
};
use medqa_relay::domain::foundation::SessionId;
use medqa_relay::ports::{
    Connection, DoctorTokenValidator, DraftError, DraftPolicy, NotificationSubscriber, Topic,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

const DROP_UNATTENDED: DraftPolicy = DraftPolicy {
    max_pending: 8,
    buffer_when_unattended: false,
};

struct Relay {
    orchestrator: SessionOrchestrator,
    bus: Arc<InMemoryNotificationBus>,
    generator: MockDraftGenerator,
}

impl Relay {
    fn new(generator: MockDraftGenerator) -> Self {
        Self::with(generator, StaticTokenValidator::permissive(), DROP_UNATTENDED)
    }

    fn with(
        generator: MockDraftGenerator,
        tokens: impl DoctorTokenValidator + 'static,
        policy: DraftPolicy,
    ) -> Self {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let bus = Arc::new(InMemoryNotificationBus::capturing());
        for topic in [Topic::DraftReady, Topic::DraftFailed] {
            bus.subscribe(
                topic,
                "relay",
                Arc::new(DraftDeliveryHandler::new(registry.clone(), policy)),
            );
        }

        let pipeline = DraftPipeline::new(
            Arc::new(generator.clone()),
            Arc::new(StaticPatientContextProvider::default()),
            bus.clone(),
        );
        let orchestrator =
            SessionOrchestrator::new(registry, Arc::new(tokens), pipeline, bus.clone(), policy);

        Self {
            orchestrator,
            bus,
            generator,
        }
    }

    /// Opens a session and consumes the SESSION_STARTED frame.
    async fn patient(&self) -> (SessionId, Client) {
        let mut patient = Client::new(Role::Patient);
        let session_id = self
            .orchestrator
            .start_session(patient.connection.clone())
            .await
            .unwrap();
        assert_eq!(patient.next().await, Frame::SessionStarted { session_id });
        (session_id, patient)
    }

    /// Joins a doctor and consumes the join notices on both sides.
    async fn doctor(&self, session_id: SessionId, patient: &mut Client) -> Client {
        let mut doctor = Client::new(Role::Doctor);
        self.orchestrator
            .join_session(session_id, doctor.connection.clone(), "token")
            .await
            .unwrap();
        assert_eq!(doctor.next_message().await.content, DOCTOR_JOINED_NOTICE);
        assert_eq!(patient.next_message().await.content, DOCTOR_JOINED_NOTICE);
        doctor
    }

    /// Patient asks; returns the draft the doctor receives.
    async fn ask(
        &self,
        session_id: SessionId,
        patient: &mut Client,
        doctor: &mut Client,
        question: &str,
    ) -> AIDraft {
        self.orchestrator
            .handle_message(session_id, Role::Patient, question)
            .await
            .unwrap();

        let forwarded = doctor.next_message().await;
        assert_eq!(forwarded.author, MessageAuthor::Patient);
        assert_eq!(forwarded.content, question);
        assert_eq!(patient.next_message().await.content, DOCTOR_REVIEWING_NOTICE);

        match doctor.next().await {
            Frame::DraftReady(draft) => draft,
            other => panic!("expected DRAFT_READY, got {:?}", other),
        }
    }

    async fn review(
        &self,
        session_id: SessionId,
        doctor: &Client,
        action: ReviewAction,
        content: Option<&str>,
    ) -> Result<ReviewOutcome, ConsultationError> {
        self.orchestrator
            .handle_review(
                session_id,
                doctor.connection.id(),
                ReviewCommand {
                    action,
                    content: content.map(str::to_string),
                    draft_id: None,
                },
            )
            .await
    }

    /// Waits until the draft pipeline has published something.
    async fn drafts_settled(&self) {
        tokio::time::timeout(RECV_TIMEOUT, async {
            while self.bus.events_on(Topic::DraftReady).is_empty()
                && self.bus.events_on(Topic::DraftFailed).is_empty()
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("draft pipeline never published");
    }
}

struct Client {
    connection: Connection,
    rx: UnboundedReceiver<Frame>,
}

impl Client {
    fn new(role: Role) -> Self {
        let (sink, rx) = ChannelSink::channel();
        Self {
            connection: Connection::new(role, sink),
            rx,
        }
    }

    async fn next(&mut self) -> Frame {
        tokio::time::timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("sink dropped")
    }

    async fn next_message(&mut self) -> ChatMessage {
        match self.next().await {
            Frame::Message(message) => message,
            other => panic!("expected MESSAGE, got {:?}", other),
        }
    }

    /// Frames already queued, without waiting.
    fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

fn scripted(content: &str, confidence: f64) -> MockDraftGenerator {
    MockDraftGenerator::echoing(content, Confidence::clamped(confidence))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn patient_question_reaches_doctor_with_draft() {
    let relay = Relay::new(scripted("Rest and drink water.", 0.95));
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;

    let draft = relay.ask(session_id, &mut patient, &mut doctor, "I have a headache").await;

    assert_eq!(draft.session_id, session_id);
    assert_eq!(draft.question, "I have a headache");
    assert!((0.0..=1.0).contains(&draft.confidence.value()));
    assert_eq!(relay.generator.call_count(), 1);
    assert_eq!(
        relay.orchestrator.session_status(session_id).await,
        Some(SessionStatus::Active)
    );
}

#[tokio::test]
async fn second_doctor_cannot_take_occupied_slot() {
    let relay = Relay::new(scripted("ok", 0.5));
    let (session_id, mut patient) = relay.patient().await;
    let mut first = relay.doctor(session_id, &mut patient).await;

    let second = Client::new(Role::Doctor);
    let err = relay
        .orchestrator
        .join_session(session_id, second.connection.clone(), "token")
        .await
        .unwrap_err();
    assert_eq!(err, ConsultationError::DoctorSlotOccupied(session_id));

    // the first doctor still gets patient traffic
    relay
        .orchestrator
        .handle_message(session_id, Role::Patient, "still there?")
        .await
        .unwrap();
    assert_eq!(first.next_message().await.content, "still there?");
}

#[tokio::test]
async fn modify_sends_doctor_text_to_patient_once() {
    let relay = Relay::new(scripted("Drink water.", 0.8));
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;
    relay.ask(session_id, &mut patient, &mut doctor, "I have a headache").await;

    let outcome = relay
        .review(session_id, &doctor, ReviewAction::Modify, Some("Take ibuprofen"))
        .await
        .unwrap();
    assert_eq!(outcome.delivered_content(), Some("Take ibuprofen"));

    let answer = patient.next_message().await;
    assert_eq!(answer.author, MessageAuthor::Doctor);
    assert_eq!(answer.content, "Take ibuprofen");
    assert!(patient.drain().is_empty());
}

#[tokio::test]
async fn approve_delivers_draft_content_unchanged() {
    let content = "  Rest, hydrate\nand see a GP if it persists.  ";
    let relay = Relay::new(scripted(content, 0.9));
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;
    let draft = relay.ask(session_id, &mut patient, &mut doctor, "headache").await;

    relay
        .review(session_id, &doctor, ReviewAction::Approve, None)
        .await
        .unwrap();

    let answer = patient.next_message().await;
    assert_eq!(answer.content.as_bytes(), draft.content.as_bytes());
    assert_eq!(answer.author, MessageAuthor::Doctor);

    let done: ReviewDone = relay.bus.events_on(Topic::ReviewDone)[0].payload_as().unwrap();
    assert_eq!(done.session_id, session_id);
}

#[tokio::test]
async fn reject_never_messages_the_patient() {
    let relay = Relay::new(scripted("Wrong advice.", 0.3));
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;
    relay.ask(session_id, &mut patient, &mut doctor, "headache").await;

    let outcome = relay
        .review(session_id, &doctor, ReviewAction::Reject, None)
        .await
        .unwrap();
    assert!(matches!(outcome, ReviewOutcome::Rejected { draft: Some(_) }));

    let notice = doctor.next_message().await;
    assert!(notice.is_system());
    assert_eq!(notice.content, RESPONSE_REJECTED_NOTICE);
    assert!(patient.drain().is_empty());

    // the rejected draft is gone
    let err = relay
        .review(session_id, &doctor, ReviewAction::Approve, None)
        .await
        .unwrap_err();
    assert_eq!(err, ConsultationError::NoDraftPending(session_id));
}

#[tokio::test]
async fn doctor_can_be_replaced_after_leaving() {
    let relay = Relay::new(scripted("ok", 0.5));
    let (session_id, mut patient) = relay.patient().await;
    let first = relay.doctor(session_id, &mut patient).await;

    relay
        .orchestrator
        .handle_disconnect(session_id, Role::Doctor, first.connection.id())
        .await;
    assert_eq!(patient.next_message().await.content, DOCTOR_LEFT_NOTICE);
    assert_eq!(
        relay.orchestrator.session_status(session_id).await,
        Some(SessionStatus::AwaitingDoctor)
    );

    let _second = relay.doctor(session_id, &mut patient).await;
    assert_eq!(
        relay.orchestrator.session_status(session_id).await,
        Some(SessionStatus::Active)
    );
}

#[tokio::test]
async fn generator_failure_reaches_doctor_only() {
    let generator = MockDraftGenerator::new()
        .with_error(DraftError::Timeout)
        .with_draft("Second try works.", Confidence::clamped(0.7));
    let relay = Relay::new(generator);
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;

    relay
        .orchestrator
        .handle_message(session_id, Role::Patient, "headache")
        .await
        .unwrap();
    doctor.next_message().await;
    assert_eq!(patient.next_message().await.content, DOCTOR_REVIEWING_NOTICE);

    match doctor.next().await {
        Frame::Error { code, .. } => assert_eq!(code, "DRAFT_GENERATION_FAILED"),
        other => panic!("expected ERROR, got {:?}", other),
    }
    assert!(patient.drain().is_empty());

    // the session keeps working
    let draft = relay.ask(session_id, &mut patient, &mut doctor, "still hurts").await;
    assert_eq!(draft.content, "Second try works.");
}

// =============================================================================
// Lifecycle edges
// =============================================================================

#[tokio::test]
async fn patient_leaving_closes_session_once() {
    let relay = Relay::new(scripted("ok", 0.5));
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;

    for _ in 0..2 {
        relay
            .orchestrator
            .handle_disconnect(session_id, Role::Patient, patient.connection.id())
            .await;
    }

    assert_eq!(doctor.next_message().await.content, PATIENT_LEFT_NOTICE);
    assert!(doctor.drain().is_empty());
    assert_eq!(relay.orchestrator.session_status(session_id).await, None);
    assert_eq!(relay.orchestrator.live_sessions().await, 0);

    let late = Client::new(Role::Doctor);
    let err = relay
        .orchestrator
        .join_session(session_id, late.connection.clone(), "token")
        .await
        .unwrap_err();
    assert_eq!(err, ConsultationError::SessionNotFound(session_id));
}

#[tokio::test]
async fn doctor_disconnect_is_idempotent() {
    let relay = Relay::new(scripted("ok", 0.5));
    let (session_id, mut patient) = relay.patient().await;
    let doctor = relay.doctor(session_id, &mut patient).await;

    for _ in 0..3 {
        relay
            .orchestrator
            .handle_disconnect(session_id, Role::Doctor, doctor.connection.id())
            .await;
    }

    assert_eq!(patient.next_message().await.content, DOCTOR_LEFT_NOTICE);
    assert!(patient.drain().is_empty());
}

#[tokio::test]
async fn unattended_drafts_are_dropped_by_default() {
    let relay = Relay::new(scripted("Rest.", 0.9));
    let (session_id, mut patient) = relay.patient().await;

    relay
        .orchestrator
        .handle_message(session_id, Role::Patient, "anyone there?")
        .await
        .unwrap();
    assert_eq!(patient.next_message().await.content, DOCTOR_REVIEWING_NOTICE);
    relay.drafts_settled().await;

    let mut doctor = relay.doctor(session_id, &mut patient).await;
    assert!(doctor.drain().iter().all(|f| !f.is_draft()));
    assert!(patient.drain().iter().all(|f| !f.is_draft()));
}

#[tokio::test]
async fn buffered_drafts_are_replayed_to_joining_doctor() {
    let policy = DraftPolicy {
        max_pending: 8,
        buffer_when_unattended: true,
    };
    let relay = Relay::with(scripted("Rest.", 0.9), StaticTokenValidator::permissive(), policy);
    let (session_id, mut patient) = relay.patient().await;

    relay
        .orchestrator
        .handle_message(session_id, Role::Patient, "anyone there?")
        .await
        .unwrap();
    relay.drafts_settled().await;

    let mut doctor = Client::new(Role::Doctor);
    relay
        .orchestrator
        .join_session(session_id, doctor.connection.clone(), "token")
        .await
        .unwrap();

    let frames = doctor.drain();
    let draft = frames
        .iter()
        .find_map(|f| match f {
            Frame::DraftReady(draft) => Some(draft.clone()),
            _ => None,
        })
        .expect("buffered draft replayed");
    assert_eq!(draft.question, "anyone there?");
    assert!(patient.drain().iter().all(|f| !f.is_draft()));

    relay
        .review(session_id, &doctor, ReviewAction::Approve, None)
        .await
        .unwrap();
    let answer = patient.next_message().await;
    assert_eq!(answer.content, "Rest.");
}

#[tokio::test]
async fn doctor_messages_reach_patient_without_drafting() {
    let relay = Relay::new(scripted("unused", 0.5));
    let (session_id, mut patient) = relay.patient().await;
    let _doctor = relay.doctor(session_id, &mut patient).await;

    relay
        .orchestrator
        .handle_message(session_id, Role::Doctor, "How long has it lasted?")
        .await
        .unwrap();

    let message = patient.next_message().await;
    assert_eq!(message.author, MessageAuthor::Doctor);
    assert_eq!(message.content, "How long has it lasted?");
    assert_eq!(relay.generator.call_count(), 0);
}

#[tokio::test]
async fn invalid_token_is_rejected_before_binding() {
    let tokens = StaticTokenValidator::new(vec![Secret::new("good-token".to_string())]);
    let relay = Relay::with(scripted("ok", 0.5), tokens, DROP_UNATTENDED);
    let (session_id, mut patient) = relay.patient().await;

    let doctor = Client::new(Role::Doctor);
    let err = relay
        .orchestrator
        .join_session(session_id, doctor.connection.clone(), "bad-token")
        .await
        .unwrap_err();
    assert_eq!(err, ConsultationError::InvalidToken);
    assert_eq!(
        relay.orchestrator.session_status(session_id).await,
        Some(SessionStatus::AwaitingDoctor)
    );
    assert!(patient.drain().is_empty());

    relay
        .orchestrator
        .join_session(session_id, doctor.connection.clone(), "good-token")
        .await
        .unwrap();
}

#[tokio::test]
async fn review_requires_the_bound_doctor() {
    let relay = Relay::new(scripted("Rest.", 0.9));
    let (session_id, mut patient) = relay.patient().await;
    let mut doctor = relay.doctor(session_id, &mut patient).await;
    relay.ask(session_id, &mut patient, &mut doctor, "headache").await;

    let stranger = Client::new(Role::Doctor);
    let err = relay
        .review(session_id, &stranger, ReviewAction::Approve, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_PERMITTED");
    assert!(patient.drain().is_empty());

    // draft is still pending for the real doctor
    relay
        .review(session_id, &doctor, ReviewAction::Approve, None)
        .await
        .unwrap();
    assert_eq!(patient.next_message().await.content, "Rest.");
}
