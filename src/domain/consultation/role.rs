//! Participant roles and message provenance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Role of a connection within a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    /// The role on the other side of the conversation.
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Patient => Role::Doctor,
            Role::Doctor => Role::Patient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAuthor {
    Patient,
    Doctor,
    System,
}

impl From<Role> for MessageAuthor {
    fn from(role: Role) -> Self {
        match role {
            Role::Patient => MessageAuthor::Patient,
            Role::Doctor => MessageAuthor::Doctor,
        }
    }
}

impl fmt::Display for MessageAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageAuthor::Patient => "patient",
            MessageAuthor::Doctor => "doctor",
            MessageAuthor::System => "system",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterpart_swaps_roles() {
        assert_eq!(Role::Patient.counterpart(), Role::Doctor);
        assert_eq!(Role::Doctor.counterpart(), Role::Patient);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!(" patient ".parse::<Role>().unwrap(), Role::Patient);
    }

    #[test]
    fn rejects_unknown_role() {
        assert!("nurse".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Doctor).unwrap(), "\"doctor\"");
        assert_eq!(
            serde_json::to_string(&MessageAuthor::System).unwrap(),
            "\"system\""
        );
    }

    #[test]
    fn author_from_role() {
        assert_eq!(MessageAuthor::from(Role::Patient), MessageAuthor::Patient);
        assert_eq!(MessageAuthor::from(Role::Doctor), MessageAuthor::Doctor);
    }
}
