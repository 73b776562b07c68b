//! Application handlers.
//!
//! Notification bus subscribers that turn published events into deliveries
//! and archive writes.

mod archive_review;
mod deliver_draft;

pub use archive_review::ArchiveReviewHandler;
pub use deliver_draft::DraftDeliveryHandler;
