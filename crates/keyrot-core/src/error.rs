//! Error types for the rotation engine.
//!
//! [`Error`] is what callers see: validation and configuration problems that
//! are rejected before any backend call, and one variant per state-machine
//! step. [`ProviderError`] is what a [`CredentialProvider`] returns; the
//! engine folds it into the step error for the step it happened in.
//!
//! [`CredentialProvider`]: crate::provider::CredentialProvider

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Stage;

/// Errors surfaced by the rotation engine and its supporting types.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Error {
    /// Request or generation parameters were rejected before any backend call.
    #[error("validation error: {reason}")]
    Validation {
        /// Why the input was rejected.
        reason: String,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {reason}")]
    Config {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// The backend refused to mint a new credential.
    #[error("create failed: {reason}")]
    CreateFailed {
        /// Backend-provided reason.
        reason: String,
    },

    /// The new credential could not be proven operable.
    #[error("verify failed: {reason}")]
    VerifyFailed {
        /// Backend-provided reason.
        reason: String,
    },

    /// Publishing the new credential to its dependents failed.
    #[error("switch-in failed: {reason}")]
    SwitchFailed {
        /// Backend-provided reason.
        reason: String,
    },

    /// Destroying the previous credential failed.
    #[error("revoke failed: {reason}")]
    RevokeFailed {
        /// Backend-provided reason.
        reason: String,
    },

    /// A provider call exceeded the step timeout.
    #[error("{stage} timed out after {timeout_ms}ms")]
    Timeout {
        /// The step that timed out.
        stage: Stage,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

impl Error {
    /// Creates a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Builds the step error for a provider failure during `stage`.
    pub fn at_stage(stage: Stage, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match stage {
            Stage::Create => Self::CreateFailed { reason },
            Stage::Verify => Self::VerifyFailed { reason },
            Stage::SwitchIn => Self::SwitchFailed { reason },
            Stage::Revoke => Self::RevokeFailed { reason },
        }
    }

    /// The state-machine step this error belongs to, if any.
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Validation { .. } | Self::Config { .. } => None,
            Self::CreateFailed { .. } => Some(Stage::Create),
            Self::VerifyFailed { .. } => Some(Stage::Verify),
            Self::SwitchFailed { .. } => Some(Stage::SwitchIn),
            Self::RevokeFailed { .. } => Some(Stage::Revoke),
            Self::Timeout { stage, .. } => Some(*stage),
        }
    }

    /// Returns true for errors raised before any backend call.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Config { .. })
    }
}

/// Result type alias for rotation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by a credential backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The backend rejected the request.
    #[error("rejected by backend: {reason}")]
    Rejected {
        /// Backend-provided reason.
        reason: String,
    },

    /// The credentials authorizing the call were refused.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Backend-provided reason.
        reason: String,
    },

    /// The backend limit on live credentials was hit.
    #[error("quota exceeded: {reason}")]
    QuotaExceeded {
        /// Backend-provided reason.
        reason: String,
    },

    /// The target does not exist on the backend.
    #[error("target not found: {target}")]
    NotFound {
        /// The locator that was not found.
        target: String,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Transport-level reason.
        reason: String,
    },

    /// The backend does not implement this primitive.
    #[error("operation not supported by backend: {operation}")]
    Unsupported {
        /// The primitive that was requested.
        operation: String,
    },

    /// The backend answered with something that could not be understood.
    #[error("invalid backend response: {reason}")]
    InvalidResponse {
        /// What was wrong with the response.
        reason: String,
    },

    /// Local I/O failed while talking to the backend.
    #[error("io error: {reason}")]
    Io {
        /// The underlying I/O error.
        reason: String,
    },
}

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}
