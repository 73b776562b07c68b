//! Application layer - orchestration and bus handlers.
//!
//! The orchestrator serves transports synchronously; the draft pipeline and
//! the handlers run on the far side of the notification bus.

mod draft_pipeline;
pub mod handlers;
mod orchestrator;

pub use draft_pipeline::DraftPipeline;
pub use handlers::{ArchiveReviewHandler, DraftDeliveryHandler};
pub use orchestrator::{ReviewCommand, SessionOrchestrator};
