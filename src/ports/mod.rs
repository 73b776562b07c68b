//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the consultation domain and the outside world. Adapters implement these
//! ports.
//!
//! ## Session Ports
//!
//! - `ConnectionRegistry` - Live sessions and the connections bound to them
//! - `FrameSink` - Non-blocking write side of one connection
//!
//! ## Drafting Ports
//!
//! - `DraftGenerator` - External AI answer service
//! - `AIProvider` - LLM chat completions behind the LLM-backed generator
//! - `PatientContextProvider` - Patient data drafts are grounded on
//!
//! ## Notification Ports
//!
//! - `NotificationPublisher` / `NotificationSubscriber` - The bus
//! - `NotificationHandler` - Consumer of one topic
//!
//! ## Collaborators
//!
//! - `DoctorTokenValidator` - Boolean doctor token check
//! - `ConsultationArchive` - Durable record of reviewed answers

mod ai_provider;
mod connection_registry;
mod consultation_archive;
mod draft_generator;
mod notification_bus;
mod patient_context;
mod token_validator;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message,
    MessageRole, ProviderInfo, TokenUsage,
};
pub use connection_registry::{
    ClosedSession, Connection, ConnectionRegistry, DeliveryError, DraftDisposition, DraftPolicy,
    FrameSink,
};
pub use consultation_archive::{ArchivedExchange, ConsultationArchive};
pub use draft_generator::{DraftError, DraftGenerator};
pub use notification_bus::{
    NotificationBus, NotificationHandler, NotificationPublisher, NotificationSubscriber, Topic,
};
pub use patient_context::PatientContextProvider;
pub use token_validator::DoctorTokenValidator;
