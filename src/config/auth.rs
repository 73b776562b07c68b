//! Doctor token configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub token_policy: TokenPolicy,

    /// Allow-listed doctor tokens (comma-separated, static policy)
    pub doctor_tokens: Option<Secret<String>>,

    /// HMAC secret for HS256 tokens (jwt policy)
    pub jwt_secret: Option<Secret<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenPolicy {
    #[default]
    Static,
    Jwt,
}

impl AuthConfig {
    /// The allow-list, split on commas. Empty when unset.
    pub fn doctor_token_list(&self) -> Vec<Secret<String>> {
        self.doctor_tokens
            .as_ref()
            .map(|raw| {
                raw.expose_secret()
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(|t| Secret::new(t.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        match self.token_policy {
            TokenPolicy::Static => {
                if *environment == Environment::Production && self.doctor_token_list().is_empty() {
                    return Err(ValidationError::PermissiveTokensInProduction);
                }
            }
            TokenPolicy::Jwt => {
                let secret = self
                    .jwt_secret
                    .as_ref()
                    .ok_or(ValidationError::MissingRequired("AUTH_JWT_SECRET"))?;
                if secret.expose_secret().len() < 32 {
                    return Err(ValidationError::WeakJwtSecret);
                }
            }
        }
        Ok(())
    }
}
