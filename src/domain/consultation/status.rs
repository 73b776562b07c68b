//! Lifecycle status of a consultation session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Session lifecycle.
///
/// `Created -> AwaitingDoctor -> Active <-> AwaitingDoctor -> Closed`.
/// Any live state may close; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    AwaitingDoctor,
    Active,
    Closed,
}

impl SessionStatus {
    /// True while a doctor may still join.
    pub fn accepts_doctor(&self) -> bool {
        matches!(self, SessionStatus::Created | SessionStatus::AwaitingDoctor)
    }
}

impl StateMachine for SessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionStatus::*;
        matches!(
            (self, target),
            (Created, AwaitingDoctor)
                | (Created, Closed)
                | (AwaitingDoctor, Active)
                | (AwaitingDoctor, Closed)
                | (Active, AwaitingDoctor)
                | (Active, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionStatus::*;
        match self {
            Created => vec![AwaitingDoctor, Closed],
            AwaitingDoctor => vec![Active, Closed],
            Active => vec![AwaitingDoctor, Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::AwaitingDoctor => "AWAITING_DOCTOR",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}
