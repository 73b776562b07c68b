//! DraftPipeline - asynchronous draft generation.
//!
//! Each patient question gets its own task. The task fetches the patient
//! context, asks the generator for a draft and publishes the result on the
//! notification bus. It never touches session state, so a session that
//! closes mid-draft simply never sees the result.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::consultation::{DraftFailed, DraftReady, DraftRequest, PatientContext};
use crate::domain::foundation::{MessageId, SerializableDomainEvent, SessionId};
use crate::ports::{DraftGenerator, NotificationPublisher, PatientContextProvider};

#[derive(Clone)]
pub struct DraftPipeline {
    generator: Arc<dyn DraftGenerator>,
    context: Arc<dyn PatientContextProvider>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl DraftPipeline {
    pub fn new(
        generator: Arc<dyn DraftGenerator>,
        context: Arc<dyn PatientContextProvider>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            generator,
            context,
            publisher,
        }
    }

    /// Starts drafting an answer to `question` and returns immediately.
    pub fn request(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        question: impl Into<String>,
    ) -> JoinHandle<()> {
        let pipeline = self.clone();
        let question = question.into();
        tokio::spawn(async move { pipeline.run(session_id, message_id, question).await })
    }

    async fn run(&self, session_id: SessionId, message_id: MessageId, question: String) {
        let context = match self.context.context_for(session_id).await {
            Ok(context) => context,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Patient context unavailable, drafting without it");
                PatientContext::default()
            }
        };

        let request = DraftRequest::new(session_id, message_id, question, context);
        let envelope = match self.generator.generate(request).await {
            Ok(draft) => {
                info!(
                    session_id = %session_id,
                    draft_id = %draft.draft_id,
                    confidence = draft.confidence.value(),
                    generator = self.generator.name(),
                    "Draft generated"
                );
                DraftReady::new(draft).to_envelope()
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    message_id = %message_id,
                    generator = self.generator.name(),
                    error = %e,
                    "Draft generation failed"
                );
                DraftFailed::new(session_id, message_id, e.to_string()).to_envelope()
            }
        };

        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to serialize draft notification");
                return;
            }
        };

        let event_type = envelope.event_type.clone();
        match self.publisher.publish(envelope).await {
            Ok(()) => debug!(session_id = %session_id, event_type = %event_type, "Draft notification published"),
            Err(e) => warn!(session_id = %session_id, event_type = %event_type, error = %e, "Failed to publish draft notification"),
        }
    }
}
