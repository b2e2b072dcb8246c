//! # Keyrot Core
//!
//! Credential rotation without lockout. One rotation walks four steps:
//!
//! - **Create**: mint a new credential, from a generated value or by the backend
//! - **Verify**: prove the new credential works (or explicitly skip when the
//!   backend cannot verify)
//! - **Switch-in**: publish the new credential to its dependents
//! - **Revoke**: destroy the old credential
//!
//! The old credential is never touched until its replacement is proven
//! operable. Every failure maps to exactly one outcome: `Failed` before the
//! new credential is live, `PartialSuccess` when only revocation failed.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keyrot_core::{
//!     BackendKind, Environment, MemoryProvider, Outcome, RotationEngine, RotationRequest, Target,
//! };
//!
//! # async fn demo() -> keyrot_core::Result<()> {
//! let provider = Arc::new(MemoryProvider::new(BackendKind::DatabasePasswordStore));
//! let engine = RotationEngine::new(provider);
//!
//! let request = RotationRequest::new(Environment::new("dev")?, Target::new("app-db")?);
//! let result = engine.rotate(&request).await?;
//! assert_eq!(result.outcome, Outcome::Success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Considerations
//!
//! - Credential values are held in [`SecretString`], zeroized on drop and
//!   compared in constant time
//! - Debug output for secrets is redacted; values are never logged
//! - Generated values come from the operating system CSPRNG

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod memory;
pub mod provider;
pub mod report;
pub mod result;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use error::{Error, ProviderError, ProviderResult, Result};
pub use types::{
    Credential, CredentialKind, CredentialStatus, CredentialValue, Environment, RotationContext,
    RotationRequest, SecretString, Target,
};

pub use generator::{Encoding, GenerationSpec, SecretGenerator};

pub use provider::{
    BackendKind, Capabilities, CredentialProvider, ProviderFuture, SwitchIn, ValueSource,
    VerifySupport,
};

pub use engine::RotationEngine;

pub use result::{OldCredentialStatus, Outcome, RotationResult, Verification};

pub use state::{RotationState, Stage};

pub use config::{BackendConfig, EngineConfig, HookSet, KeyrotConfig};

pub use memory::{CallCounts, Fault, MemoryProvider};

pub use command::CommandProvider;

pub use report::RotationReport;
