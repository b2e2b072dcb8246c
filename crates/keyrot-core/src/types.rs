//! Core types for credential rotation.
//!
//! - [`SecretString`]: sensitive text that zeroizes on drop and never prints
//! - [`Credential`]: a credential value and its lifecycle status
//! - [`Environment`] / [`Target`]: validated caller identifiers
//! - [`RotationRequest`]: caller intent for a single rotation
//! - [`RotationContext`]: what every provider call is told about the rotation

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::generator::GenerationSpec;

/// Sensitive text, zeroized when dropped.
///
/// There is deliberately no `Display` impl; use [`SecretString::expose`] at
/// the single place a value must leave the process.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wraps a sensitive string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Returns the sensitive content.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretString")
            .field("len", &self.inner.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecretString {}

/// The shape of credential a backend issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    /// A bearer token (API token, installation token).
    OpaqueToken,
    /// A public key id plus a private secret (IAM access keys).
    AccessKeyPair,
    /// A password for a database or service account.
    Password,
    /// Any other secret-store value.
    GenericSecret,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpaqueToken => write!(f, "opaque-token"),
            Self::AccessKeyPair => write!(f, "access-key-pair"),
            Self::Password => write!(f, "password"),
            Self::GenericSecret => write!(f, "generic-secret"),
        }
    }
}

/// The sensitive payload of a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialValue {
    /// A single secret string.
    Single(SecretString),
    /// A public id and its private secret.
    KeyPair {
        /// Public half (e.g. `AKIA...`); not sensitive.
        access_key_id: String,
        /// Private half.
        secret: SecretString,
    },
}

impl CredentialValue {
    /// Wraps a single secret.
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(SecretString::new(value))
    }

    /// Builds a key pair value.
    #[must_use]
    pub fn key_pair(access_key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::KeyPair {
            access_key_id: access_key_id.into(),
            secret: SecretString::new(secret),
        }
    }

    /// The private part of the value.
    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        match self {
            Self::Single(secret) | Self::KeyPair { secret, .. } => secret,
        }
    }

    /// The public id, for key pairs.
    #[must_use]
    pub fn access_key_id(&self) -> Option<&str> {
        match self {
            Self::Single(_) => None,
            Self::KeyPair { access_key_id, .. } => Some(access_key_id),
        }
    }
}

/// Lifecycle status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// Requested, not yet confirmed by the backend.
    Pending,
    /// Live and in use.
    Active,
    /// Proven operable, not yet published.
    Verified,
    /// Published to dependents.
    SwitchedIn,
    /// Destroyed.
    Revoked,
    /// Exists on the backend but nothing uses it.
    Orphaned,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Verified => write!(f, "verified"),
            Self::SwitchedIn => write!(f, "switched_in"),
            Self::Revoked => write!(f, "revoked"),
            Self::Orphaned => write!(f, "orphaned"),
        }
    }
}

/// A credential and where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// What shape of credential this is.
    pub kind: CredentialKind,
    /// Provider-assigned handle, absent until the backend assigns one.
    pub identifier: Option<String>,
    /// The sensitive payload, when known.
    pub value: Option<CredentialValue>,
    /// Lifecycle status.
    pub status: CredentialStatus,
}

impl Credential {
    /// A freshly requested credential with nothing assigned yet.
    #[must_use]
    pub const fn pending(kind: CredentialKind) -> Self {
        Self {
            kind,
            identifier: None,
            value: None,
            status: CredentialStatus::Pending,
        }
    }

    /// The credential currently in use for a slot.
    #[must_use]
    pub const fn active(kind: CredentialKind) -> Self {
        Self {
            kind,
            identifier: None,
            value: None,
            status: CredentialStatus::Active,
        }
    }

    /// Sets the provider-assigned identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Sets the sensitive payload.
    #[must_use]
    pub fn with_value(mut self, value: CredentialValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the lifecycle status.
    #[must_use]
    pub const fn with_status(mut self, status: CredentialStatus) -> Self {
        self.status = status;
        self
    }

    /// A copy without the sensitive payload, for reporting.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            kind: self.kind,
            identifier: self.identifier.clone(),
            value: None,
            status: self.status,
        }
    }

    /// The identifier, or a placeholder when none was assigned.
    #[must_use]
    pub fn display_id(&self) -> &str {
        self.identifier.as_deref().unwrap_or("<unassigned>")
    }

    /// Returns true if a non-empty secret is present.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.secret().is_empty())
    }
}

/// A validated environment name (e.g. `dev`, `stage`, `prod`).
///
/// Names must:
/// - Be between 1 and 32 characters
/// - Contain only lowercase alphanumeric characters, hyphens and underscores
///
/// Membership in a deployment's closed set is checked by
/// [`crate::config::KeyrotConfig::environment`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Environment(String);

impl Environment {
    /// Maximum length of an environment name.
    pub const MAX_LENGTH: usize = 32;

    /// Creates a new `Environment` after validating the name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("environment name cannot be empty"));
        }
        if name.len() > Self::MAX_LENGTH {
            return Err(Error::validation(format!(
                "environment name exceeds maximum length of {} characters",
                Self::MAX_LENGTH
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            return Err(Error::validation(format!(
                "environment name contains invalid character '{c}'"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Environment> for String {
    fn from(env: Environment) -> Self {
        env.0
    }
}

/// Opaque backend-specific locator (IAM username, secret ARN, project ref).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    /// Maximum length of a target locator.
    pub const MAX_LENGTH: usize = 2048;

    /// Creates a new `Target`, rejecting empty or oversized locators.
    pub fn new(locator: impl Into<String>) -> Result<Self> {
        let locator = locator.into();
        if locator.trim().is_empty() {
            return Err(Error::validation("target cannot be empty"));
        }
        if locator.len() > Self::MAX_LENGTH {
            return Err(Error::validation(format!(
                "target exceeds maximum length of {} characters",
                Self::MAX_LENGTH
            )));
        }
        if locator.chars().any(char::is_control) {
            return Err(Error::validation("target contains control characters"));
        }
        Ok(Self(locator))
    }

    /// Returns the locator as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Target {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0
    }
}

/// Caller intent for one rotation.
#[derive(Debug, Clone)]
pub struct RotationRequest {
    /// Which provider-credential set authorizes the calls.
    pub environment: Environment,
    /// What to rotate.
    pub target: Target,
    /// The credential being replaced, as far as the caller knows it.
    pub current: Option<Credential>,
    /// How to synthesize the new value when the backend does not.
    pub generation: Option<GenerationSpec>,
}

impl RotationRequest {
    /// Creates a request with no known current credential and no generation spec.
    #[must_use]
    pub const fn new(environment: Environment, target: Target) -> Self {
        Self {
            environment,
            target,
            current: None,
            generation: None,
        }
    }

    /// Describes the credential being replaced.
    #[must_use]
    pub fn with_current(mut self, current: Credential) -> Self {
        self.current = Some(current);
        self
    }

    /// Sets the generation parameters.
    #[must_use]
    pub const fn with_generation(mut self, spec: GenerationSpec) -> Self {
        self.generation = Some(spec);
        self
    }
}

/// Per-rotation information handed to every provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationContext {
    /// Unique id of this rotation invocation.
    pub rotation_id: Uuid,
    /// Environment the rotation runs in.
    pub environment: Environment,
    /// Target being rotated.
    pub target: Target,
}

impl RotationContext {
    /// Creates a context with a fresh rotation id.
    #[must_use]
    pub fn new(environment: Environment, target: Target) -> Self {
        Self {
            rotation_id: Uuid::new_v4(),
            environment,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn secret_string_debug_redacts_value() {
        let secret = SecretString::new("hunter2-hunter2");
        let debug = format!("{secret:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn secret_string_equality() {
        let a = SecretString::new("abc");
        let b = SecretString::new("abc");
        let c = SecretString::new("abd");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, SecretString::new("abcd"));
    }

    #[test]
    fn credential_debug_never_leaks_value() {
        let cred = Credential::pending(CredentialKind::AccessKeyPair)
            .with_identifier("AKIAEXAMPLE")
            .with_value(CredentialValue::key_pair("AKIAEXAMPLE", "wJalrXUtnFEMI"));
        let debug = format!("{cred:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn credential_redacted_drops_value() {
        let cred = Credential::pending(CredentialKind::Password)
            .with_identifier("db-1")
            .with_value(CredentialValue::single("s3cret-password"));
        assert!(cred.has_value());
        let redacted = cred.redacted();
        assert_eq!(redacted.identifier.as_deref(), Some("db-1"));
        assert!(redacted.value.is_none());
        assert!(!redacted.has_value());
    }

    #[test]
    fn credential_display_id_placeholder() {
        let cred = Credential::active(CredentialKind::OpaqueToken);
        assert_eq!(cred.display_id(), "<unassigned>");
        assert_eq!(cred.with_identifier("tok-1").display_id(), "tok-1");
    }

    #[test]
    fn key_pair_exposes_public_half_only_through_accessor() {
        let value = CredentialValue::key_pair("AKIA1", "secret");
        assert_eq!(value.access_key_id(), Some("AKIA1"));
        assert_eq!(value.secret().expose(), "secret");
        assert_eq!(CredentialValue::single("x").access_key_id(), None);
    }

    #[test_case("dev" ; "simple")]
    #[test_case("prod-eu_1" ; "with separators")]
    #[test_case("2024" ; "digits")]
    fn environment_valid(name: &str) {
        let env = Environment::new(name).expect("should be valid");
        assert_eq!(env.as_str(), name);
    }

    #[test_case("" ; "empty")]
    #[test_case("Prod" ; "uppercase")]
    #[test_case("prod env" ; "space")]
    #[test_case("prod/eu" ; "slash")]
    fn environment_invalid(name: &str) {
        assert!(matches!(
            Environment::new(name),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn environment_exceeds_max_length() {
        let name = "a".repeat(Environment::MAX_LENGTH + 1);
        assert!(Environment::new(name).is_err());
    }

    #[test]
    fn environment_serde_rejects_invalid() {
        let result: std::result::Result<Environment, _> = serde_json::from_str(r#""PROD""#);
        assert!(result.is_err());
    }

    #[test]
    fn target_accepts_arn() {
        let arn = "arn:aws:secretsmanager:eu-west-1:123456789012:secret:db-AbCdEf";
        let target = Target::new(arn).expect("valid");
        assert_eq!(target.as_str(), arn);
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace")]
    #[test_case("user\nname" ; "newline")]
    fn target_invalid(locator: &str) {
        assert!(Target::new(locator).is_err());
    }

    #[test]
    fn rotation_context_ids_are_unique() {
        let env = Environment::new("dev").expect("valid");
        let target = Target::new("svc-user").expect("valid");
        let a = RotationContext::new(env.clone(), target.clone());
        let b = RotationContext::new(env, target);
        assert_ne!(a.rotation_id, b.rotation_id);
    }
}
