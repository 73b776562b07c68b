//! DraftDeliveryHandler - routes draft notifications to the session's doctor.
//!
//! Subscribed to `draft-ready` and `draft-failed`. Drafts and draft failures
//! are addressed to the doctor slot only; the patient never sees either.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::consultation::{ConsultationError, DraftFailed, DraftReady, Frame, Role};
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{
    ConnectionRegistry, DraftDisposition, DraftPolicy, NotificationHandler, Topic,
};

pub struct DraftDeliveryHandler {
    registry: Arc<dyn ConnectionRegistry>,
    policy: DraftPolicy,
}

impl DraftDeliveryHandler {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, policy: DraftPolicy) -> Self {
        Self { registry, policy }
    }

    async fn deliver_draft(&self, event: DraftReady) {
        let session_id = event.session_id;
        let draft_id = event.draft.draft_id;

        match self.registry.offer_draft(event.draft, self.policy).await {
            DraftDisposition::Delivered => {
                info!(session_id = %session_id, draft_id = %draft_id, "Draft delivered to doctor")
            }
            DraftDisposition::Buffered => {
                info!(session_id = %session_id, draft_id = %draft_id, "No doctor bound, draft kept for next doctor")
            }
            DraftDisposition::DroppedUnattended => {
                warn!(session_id = %session_id, draft_id = %draft_id, "No doctor bound, draft dropped")
            }
            DraftDisposition::DroppedSessionGone => {
                debug!(session_id = %session_id, draft_id = %draft_id, "Session closed, draft dropped")
            }
            DraftDisposition::DeliveryFailed => {
                warn!(session_id = %session_id, draft_id = %draft_id, "Draft kept but doctor write failed")
            }
        }
    }

    async fn report_failure(&self, event: DraftFailed) -> Result<(), DomainError> {
        let session_id = event.session_id;
        let err = ConsultationError::draft_failed(event.reason);

        let delivered = self
            .registry
            .deliver(session_id, Role::Doctor, Frame::error(Some(session_id), &err))
            .await
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;
        if !delivered {
            debug!(session_id = %session_id, "No doctor bound, draft failure not reported");
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for DraftDeliveryHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        match Topic::for_event_type(&event.event_type) {
            Some(Topic::DraftReady) => {
                self.deliver_draft(event.payload_as()?).await;
                Ok(())
            }
            Some(Topic::DraftFailed) => self.report_failure(event.payload_as()?).await,
            _ => {
                debug!(event_type = %event.event_type, "Ignoring unrelated notification");
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "DraftDeliveryHandler"
    }
}
