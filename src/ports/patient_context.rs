//! Patient context port - supplies the data drafts are grounded on.

use async_trait::async_trait;

use crate::domain::consultation::PatientContext;
use crate::domain::foundation::{DomainError, SessionId};

#[async_trait]
pub trait PatientContextProvider: Send + Sync {
    /// Snapshot of the patient's context for a session.
    async fn context_for(&self, session_id: SessionId) -> Result<PatientContext, DomainError>;
}
