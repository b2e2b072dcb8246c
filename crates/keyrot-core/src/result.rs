//! Rotation outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::provider::BackendKind;
use crate::state::{RotationState, Stage};
use crate::types::{Credential, Environment, Target};

/// Process exit status for [`Outcome::Success`].
pub const EXIT_SUCCESS: u8 = 0;

/// Process exit status for [`Outcome::Failed`].
pub const EXIT_FAILED: u8 = 1;

/// Process exit status for [`Outcome::PartialSuccess`].
pub const EXIT_PARTIAL_SUCCESS: u8 = 2;

/// Overall classification of a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// New credential live, old credential revoked.
    Success,
    /// New credential live, old credential not revoked.
    PartialSuccess,
    /// No usable new credential is in service.
    Failed,
}

impl Outcome {
    /// Exit status a CLI wrapper should return.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => EXIT_SUCCESS,
            Self::PartialSuccess => EXIT_PARTIAL_SUCCESS,
            Self::Failed => EXIT_FAILED,
        }
    }

    /// Returns true if a working new credential is in service.
    #[must_use]
    pub const fn has_new_credential(self) -> bool {
        matches!(self, Self::Success | Self::PartialSuccess)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialSuccess => write!(f, "partial_success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What the caller should assume about the credential being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OldCredentialStatus {
    /// Destroyed by the backend.
    Revoked,
    /// Still valid; no destructive call was made or it was refused.
    StillActive,
    /// A destructive call was made but its effect is unknown (timeout).
    Unknown,
}

impl fmt::Display for OldCredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revoked => write!(f, "revoked"),
            Self::StillActive => write!(f, "still_active"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How the verify step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// The backend confirmed the new credential works.
    Passed,
    /// The backend has no verification primitive.
    Skipped,
    /// The backend rejected the new credential, errored, or timed out.
    Failed,
    /// The rotation stopped before verification.
    NotReached,
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
            Self::NotReached => write!(f, "not_reached"),
        }
    }
}

/// Structured outcome of one rotation.
///
/// This is the only durable record of the rotation; the engine keeps nothing.
#[derive(Debug, Clone)]
pub struct RotationResult {
    /// Unique id of this rotation.
    pub rotation_id: Uuid,
    /// Environment the rotation ran in.
    pub environment: Environment,
    /// Target that was rotated.
    pub target: Target,
    /// Backend variant that was driven.
    pub backend: BackendKind,
    /// Overall classification.
    pub outcome: Outcome,
    /// The new credential, with its value, on success or partial success.
    pub new_credential: Option<Credential>,
    /// The new credential left behind by a failed rotation, without its value.
    pub stray_credential: Option<Credential>,
    /// The credential that was being replaced, without its value.
    pub old_credential: Credential,
    /// What the caller should assume about the old credential.
    pub old_credential_status: OldCredentialStatus,
    /// The step that failed, if any.
    pub failure_stage: Option<Stage>,
    /// The step error, if any.
    pub error: Option<Error>,
    /// How verification ended.
    pub verification: Verification,
    /// Every state reached, in order, starting at [`RotationState::Start`].
    pub trace: Vec<RotationState>,
    /// Operator-facing warnings; non-empty whenever manual action is needed.
    pub warnings: Vec<String>,
    /// When the rotation started.
    pub started_at: DateTime<Utc>,
    /// When the rotation finished.
    pub finished_at: DateTime<Utc>,
}

impl RotationResult {
    /// Returns true for [`Outcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// The furthest state reached.
    #[must_use]
    pub fn final_state(&self) -> RotationState {
        self.trace.last().copied().unwrap_or(RotationState::Start)
    }

    /// Returns true when two live credentials may exist for the target.
    #[must_use]
    pub fn both_credentials_extant(&self) -> bool {
        self.old_credential_status != OldCredentialStatus::Revoked
            && (self.outcome.has_new_credential() || self.failure_stage == Some(Stage::SwitchIn))
    }

    /// Returns true when an operator has to clean something up.
    #[must_use]
    pub fn requires_operator_action(&self) -> bool {
        matches!(
            self.failure_stage,
            Some(Stage::Verify | Stage::SwitchIn | Stage::Revoke)
        )
    }

    /// Exit status a CLI wrapper should return.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    /// Wall-clock duration of the rotation.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
