//! Allow-list token validation.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::ports::DoctorTokenValidator;

/// Accepts tokens found in a configured allow-list.
///
/// An empty allow-list accepts any non-empty token, which keeps local
/// development free of token plumbing.
pub struct StaticTokenValidator {
    tokens: Vec<Secret<String>>,
}

impl StaticTokenValidator {
    pub fn new(tokens: Vec<Secret<String>>) -> Self {
        Self { tokens }
    }

    /// Validator that accepts any non-empty token.
    pub fn permissive() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn is_permissive(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[async_trait]
impl DoctorTokenValidator for StaticTokenValidator {
    async fn is_valid(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        if self.is_permissive() {
            return true;
        }

        // Scan the whole list so the match position does not leak through timing.
        let matched = self.tokens.iter().fold(false, |found, allowed| {
            constant_time_compare(allowed.expose_secret().as_bytes(), token.as_bytes()) | found
        });
        if !matched {
            debug!("Doctor token not in allow-list");
        }
        matched
    }
}
