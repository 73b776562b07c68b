//! HS256 JWT validation for doctor tokens.
//!
//! A token is accepted when its signature verifies against the shared
//! secret, it has not expired and its `role` claim is `doctor`.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::domain::consultation::Role;
use crate::ports::DoctorTokenValidator;

/// Claims a doctor token must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorClaims {
    /// Subject - the doctor's identifier
    pub sub: String,

    /// Must equal "doctor"
    pub role: String,

    /// Expiry timestamp (Unix epoch seconds)
    pub exp: i64,
}

pub struct JwtTokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenValidator {
    pub fn new(secret: &Secret<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Decodes and checks a token, returning its claims.
    pub fn claims(&self, token: &str) -> Option<DoctorClaims> {
        let data = decode::<DoctorClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("Doctor token expired"),
                ErrorKind::InvalidSignature => tracing::warn!("Doctor token has a bad signature"),
                other => tracing::debug!("Doctor token rejected: {:?}", other),
            })
            .ok()?;

        if data.claims.role != Role::Doctor.as_str() {
            tracing::warn!(sub = %data.claims.sub, role = %data.claims.role, "Token is not a doctor token");
            return None;
        }
        Some(data.claims)
    }
}

#[async_trait]
impl DoctorTokenValidator for JwtTokenValidator {
    async fn is_valid(&self, token: &str) -> bool {
        self.claims(token).is_some()
    }
}
