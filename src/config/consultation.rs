//! Consultation policy and default patient context

use serde::Deserialize;
use std::collections::BTreeMap;

use super::error::ValidationError;
use crate::domain::consultation::PatientContext;
use crate::ports::DraftPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationConfig {
    /// Drafts kept per session awaiting review
    #[serde(default = "default_max_pending_drafts")]
    pub max_pending_drafts: usize,

    /// Keep drafts that arrive while no doctor is bound and hand them to the
    /// next doctor that joins
    #[serde(default)]
    pub replay_drafts_on_join: bool,

    pub patient_age: Option<u32>,

    pub patient_gender: Option<String>,

    /// Comma-separated conditions
    pub patient_medical_history: Option<String>,

    /// Comma-separated `name=value` readings
    pub patient_biometrics: Option<String>,
}

impl ConsultationConfig {
    pub fn draft_policy(&self) -> DraftPolicy {
        DraftPolicy {
            max_pending: self.max_pending_drafts,
            buffer_when_unattended: self.replay_drafts_on_join,
        }
    }

    /// Context attached to every draft request.
    pub fn default_context(&self) -> PatientContext {
        let medical_history = split_list(self.patient_medical_history.as_deref())
            .map(str::to_string)
            .collect();
        let biometrics: BTreeMap<String, String> = split_list(self.patient_biometrics.as_deref())
            .filter_map(|reading| reading.split_once('='))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        PatientContext {
            age: self.patient_age,
            gender: self.patient_gender.clone(),
            medical_history,
            biometrics,
            chat_history: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_pending_drafts == 0 || self.max_pending_drafts > 100 {
            return Err(ValidationError::InvalidDraftCap);
        }
        Ok(())
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl Default for ConsultationConfig {
    fn default() -> Self {
        Self {
            max_pending_drafts: default_max_pending_drafts(),
            replay_drafts_on_join: false,
            patient_age: None,
            patient_gender: None,
            patient_medical_history: None,
            patient_biometrics: None,
        }
    }
}

fn default_max_pending_drafts() -> usize {
    8
}
