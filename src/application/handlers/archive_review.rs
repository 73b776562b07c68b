//! ArchiveReviewHandler - stores finalised exchanges.
//!
//! Subscribed to `review-done`. Rejected drafts delivered nothing and are
//! not archived.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::consultation::ReviewDone;
use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{ArchivedExchange, ConsultationArchive, NotificationHandler};

pub struct ArchiveReviewHandler {
    archive: Arc<dyn ConsultationArchive>,
}

impl ArchiveReviewHandler {
    pub fn new(archive: Arc<dyn ConsultationArchive>) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl NotificationHandler for ArchiveReviewHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let review: ReviewDone = event.payload_as()?;

        match ArchivedExchange::from_review(&review) {
            Some(exchange) => self.archive.archive(exchange).await,
            None => {
                debug!(session_id = %review.session_id, "Rejected review, nothing to archive");
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "ArchiveReviewHandler"
    }
}
