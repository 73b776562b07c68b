//! Doctor token validation port.
//!
//! The relay only needs a yes/no answer; the policy behind it (allow-list,
//! signed tokens, an identity provider) belongs to the implementation.

use async_trait::async_trait;

#[async_trait]
pub trait DoctorTokenValidator: Send + Sync {
    /// True if `token` entitles its bearer to join a session as a doctor.
    async fn is_valid(&self, token: &str) -> bool;
}
