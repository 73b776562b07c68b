//! Patient context from configuration.
//!
//! Every session gets the same configured context. Stands in until a
//! patient records service is wired behind `PatientContextProvider`.

use async_trait::async_trait;

use crate::domain::consultation::PatientContext;
use crate::domain::foundation::{DomainError, SessionId};
use crate::ports::PatientContextProvider;

#[derive(Debug, Clone, Default)]
pub struct StaticPatientContextProvider {
    context: PatientContext,
}

impl StaticPatientContextProvider {
    pub fn new(context: PatientContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl PatientContextProvider for StaticPatientContextProvider {
    async fn context_for(&self, _session_id: SessionId) -> Result<PatientContext, DomainError> {
        Ok(self.context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_session_gets_the_configured_context() {
        let provider = StaticPatientContextProvider::new(PatientContext {
            age: Some(35),
            medical_history: vec!["Hypertension".to_string()],
            ..Default::default()
        });

        let a = provider.context_for(SessionId::new()).await.unwrap();
        let b = provider.context_for(SessionId::new()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.age, Some(35));
    }
}
