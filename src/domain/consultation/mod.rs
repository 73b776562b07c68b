//! Consultation domain - sessions, messages, AI drafts and doctor reviews.

mod draft;
mod errors;
mod events;
mod frame;
mod message;
mod review;
mod role;
mod session;
mod status;

pub use draft::{AIDraft, Confidence, DraftRequest, PatientContext};
pub use errors::ConsultationError;
pub use events::{DraftFailed, DraftReady, ReviewDone};
pub use frame::Frame;
pub use message::{
    ChatMessage, DOCTOR_JOINED_NOTICE, DOCTOR_LEFT_NOTICE, DOCTOR_REVIEWING_NOTICE,
    PATIENT_LEFT_NOTICE, RESPONSE_REJECTED_NOTICE,
};
pub use review::{ReviewAction, ReviewDecision, ReviewOutcome};
pub use role::{MessageAuthor, Role};
pub use session::Session;
pub use status::SessionStatus;
