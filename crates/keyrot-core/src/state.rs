//! Rotation state machine states and steps.
//!
//! ```text
//! Start ──create──▶ Created ──verify──▶ Verified ──switch-in──▶ SwitchedIn ──revoke──▶ Revoked
//!   │                 │                    │                       │
//!   ▼                 ▼                    ▼                       ▼
//! CreateFailed    VerifyFailed         SwitchFailed            RevokeFailed
//! ```
//!
//! Forward transitions are the only transitions; every failure exit is
//! terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A step of the rotation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Mint the new credential.
    Create,
    /// Prove the new credential works.
    Verify,
    /// Publish the new credential to its dependents.
    SwitchIn,
    /// Retire the previous credential.
    Revoke,
}

impl Stage {
    /// All steps, in execution order.
    pub const ALL: [Self; 4] = [Self::Create, Self::Verify, Self::SwitchIn, Self::Revoke];

    /// The state reached when this step succeeds.
    pub const fn target_state(self) -> RotationState {
        match self {
            Self::Create => RotationState::Created,
            Self::Verify => RotationState::Verified,
            Self::SwitchIn => RotationState::SwitchedIn,
            Self::Revoke => RotationState::Revoked,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Verify => write!(f, "verify"),
            Self::SwitchIn => write!(f, "switch-in"),
            Self::Revoke => write!(f, "revoke"),
        }
    }
}

/// A non-failure state of the rotation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationState {
    /// Nothing has happened yet.
    Start,
    /// The new credential exists on the backend.
    Created,
    /// The new credential is proven operable (or verification is unsupported).
    Verified,
    /// Dependents now use the new credential.
    SwitchedIn,
    /// The old credential is gone. Terminal success.
    Revoked,
}

impl RotationState {
    /// The step that leaves this state, or `None` once done.
    pub const fn next_stage(self) -> Option<Stage> {
        match self {
            Self::Start => Some(Stage::Create),
            Self::Created => Some(Stage::Verify),
            Self::Verified => Some(Stage::SwitchIn),
            Self::SwitchedIn => Some(Stage::Revoke),
            Self::Revoked => None,
        }
    }

    /// Advances past `stage`.
    ///
    /// Returns `None` when `stage` is not the step that leaves this state,
    /// which rules out skipped or repeated steps.
    pub fn advance(self, stage: Stage) -> Option<Self> {
        (self.next_stage() == Some(stage)).then(|| stage.target_state())
    }

    /// Returns true once the rotation has fully completed.
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Revoked)
    }
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Created => write!(f, "created"),
            Self::Verified => write!(f, "verified"),
            Self::SwitchedIn => write!(f, "switched_in"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}
