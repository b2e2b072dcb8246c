//! The credential backend capability interface.
//!
//! A [`CredentialProvider`] executes the four rotation primitives against one
//! backend. The engine only ever talks to this trait; concrete backends live
//! behind it (see [`crate::memory`] and [`crate::command`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ProviderError, ProviderResult};
use crate::generator::{DATABASE_PASSWORD_MIN_LENGTH, GENERIC_SECRET_MIN_LENGTH, SecretGenerator};
use crate::types::{Credential, CredentialKind, RotationContext, SecretString};

/// Boxed future returned by provider calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = ProviderResult<T>> + Send + 'a>>;

/// Backend variants the engine knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Issues bearer tokens (e.g. an app installation token API).
    TokenIssuer,
    /// Issues access key pairs for an identity (e.g. IAM users).
    IamKeyStore,
    /// Stores arbitrary secret values (e.g. a managed secrets service).
    SecretStore,
    /// Holds a database password on a control plane.
    DatabasePasswordStore,
}

impl BackendKind {
    /// All backend variants.
    pub const ALL: [Self; 4] = [
        Self::TokenIssuer,
        Self::IamKeyStore,
        Self::SecretStore,
        Self::DatabasePasswordStore,
    ];

    /// The kind of credential this backend rotates.
    #[must_use]
    pub const fn credential_kind(self) -> CredentialKind {
        match self {
            Self::TokenIssuer => CredentialKind::OpaqueToken,
            Self::IamKeyStore => CredentialKind::AccessKeyPair,
            Self::SecretStore => CredentialKind::GenericSecret,
            Self::DatabasePasswordStore => CredentialKind::Password,
        }
    }

    /// Where new credential values come from.
    #[must_use]
    pub const fn value_source(self) -> ValueSource {
        match self {
            Self::TokenIssuer | Self::IamKeyStore => ValueSource::Backend,
            Self::SecretStore | Self::DatabasePasswordStore => ValueSource::Caller,
        }
    }

    /// Minimum generated length, for caller-supplied backends.
    #[must_use]
    pub const fn min_secret_length(self) -> Option<usize> {
        match self {
            Self::TokenIssuer | Self::IamKeyStore => None,
            Self::SecretStore => Some(GENERIC_SECRET_MIN_LENGTH),
            Self::DatabasePasswordStore => Some(DATABASE_PASSWORD_MIN_LENGTH),
        }
    }

    /// A generator enforcing this backend's minimum length.
    #[must_use]
    pub fn generator(self) -> SecretGenerator {
        SecretGenerator::new(self.min_secret_length().unwrap_or(GENERIC_SECRET_MIN_LENGTH))
    }

    /// Default capabilities for this backend.
    #[must_use]
    pub const fn default_capabilities(self) -> Capabilities {
        match self {
            Self::TokenIssuer | Self::IamKeyStore | Self::DatabasePasswordStore => Capabilities {
                verify: VerifySupport::Supported,
                switch_in: SwitchIn::Required,
            },
            Self::SecretStore => Capabilities {
                verify: VerifySupport::Unsupported,
                switch_in: SwitchIn::Required,
            },
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenIssuer => write!(f, "token-issuer"),
            Self::IamKeyStore => write!(f, "iam-key-store"),
            Self::SecretStore => write!(f, "secret-store"),
            Self::DatabasePasswordStore => write!(f, "database-password-store"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "unknown backend kind '{s}'; supported: token-issuer, iam-key-store, secret-store, database-password-store"
                ))
            })
    }
}

/// Who produces the new credential value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// The engine generates the value and hands it to `create`.
    Caller,
    /// The backend mints the value itself.
    Backend,
}

/// Whether a backend can prove a new credential works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySupport {
    /// `verify` is implemented and will be called.
    Supported,
    /// `verify` is not implemented; the step is skipped with a warning.
    Unsupported,
}

/// Whether a separate publish step is needed after `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchIn {
    /// `switch_in` is called after verification.
    Required,
    /// `create` already makes the new credential the live one.
    NotApplicable,
}

/// What a provider declares it can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Verification support.
    pub verify: VerifySupport,
    /// Switch-in requirement.
    pub switch_in: SwitchIn,
}

impl Capabilities {
    /// Overrides verification support.
    #[must_use]
    pub const fn with_verify(mut self, verify: VerifySupport) -> Self {
        self.verify = verify;
        self
    }

    /// Overrides the switch-in requirement.
    #[must_use]
    pub const fn with_switch_in(mut self, switch_in: SwitchIn) -> Self {
        self.switch_in = switch_in;
        self
    }
}

/// A credential backend.
///
/// Implementations own their retry policy; the engine calls each primitive at
/// most once per rotation and treats any error or timeout as that step's
/// failure.
pub trait CredentialProvider: Send + Sync {
    /// The backend variant this provider talks to.
    fn backend(&self) -> BackendKind;

    /// Declared capabilities. Defaults to the backend's table entry.
    fn capabilities(&self) -> Capabilities {
        self.backend().default_capabilities()
    }

    /// Mint a new credential.
    ///
    /// `value` is `Some` for caller-supplied backends and `None` when the
    /// backend generates its own value. The returned credential must carry
    /// the value that dependents should use.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the request.
    fn create<'a>(
        &'a self,
        ctx: &'a RotationContext,
        value: Option<&'a SecretString>,
    ) -> ProviderFuture<'a, Credential>;

    /// Prove that `credential` is usable.
    ///
    /// `Ok(false)` means the backend answered and the credential does not work.
    ///
    /// # Errors
    ///
    /// Returns error if the check itself could not be carried out.
    fn verify<'a>(
        &'a self,
        ctx: &'a RotationContext,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, bool> {
        let _ = (ctx, credential);
        Box::pin(async {
            Err(ProviderError::Unsupported {
                operation: "verify".to_string(),
            })
        })
    }

    /// Publish `credential` to its dependents. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if publishing fails.
    fn switch_in<'a>(
        &'a self,
        ctx: &'a RotationContext,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, ()> {
        let _ = (ctx, credential);
        Box::pin(async { Ok(()) })
    }

    /// Destroy the previous credential.
    ///
    /// `new` is the credential that replaced `old`; it must survive. When
    /// `old` carries no identifier, the previous credential is every live one
    /// for the target other than `new`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend refuses or the call fails.
    fn revoke<'a>(
        &'a self,
        ctx: &'a RotationContext,
        old: &'a Credential,
        new: &'a Credential,
    ) -> ProviderFuture<'a, ()>;
}
