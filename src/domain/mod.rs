//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, event envelopes)
//! - `consultation` - Sessions, roles, drafts, reviews and outbound frames

pub mod consultation;
pub mod foundation;
