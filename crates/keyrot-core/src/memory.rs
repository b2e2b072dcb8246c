//! In-memory credential provider.
//!
//! [`MemoryProvider`] behaves like a real backend of any [`BackendKind`]: it
//! keeps the live credentials of every target, enforces an optional cap on
//! live credentials per target, and can be told to fail any step. It backs
//! the engine tests and dry runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::generator::{Encoding, GenerationSpec, SecretGenerator};
use crate::provider::{BackendKind, Capabilities, CredentialProvider, ProviderFuture, SwitchIn};
use crate::state::Stage;
use crate::types::{Credential, CredentialStatus, CredentialValue, RotationContext, SecretString};

/// Length of values minted by backend-generated kinds.
const MINTED_LENGTH: usize = 40;

/// A failure injected into one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The call returns this error.
    Error(ProviderError),
    /// `verify` answers that the credential is not usable.
    RejectVerification,
    /// The call never completes.
    Hang,
}

/// How many times each primitive was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `create` calls.
    pub create: usize,
    /// `verify` calls.
    pub verify: usize,
    /// `switch_in` calls.
    pub switch_in: usize,
    /// `revoke` calls.
    pub revoke: usize,
}

impl CallCounts {
    /// Calls across all primitives.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.create + self.verify + self.switch_in + self.revoke
    }

    fn bump(&mut self, stage: Stage) {
        match stage {
            Stage::Create => self.create += 1,
            Stage::Verify => self.verify += 1,
            Stage::SwitchIn => self.switch_in += 1,
            Stage::Revoke => self.revoke += 1,
        }
    }
}

#[derive(Debug, Default)]
struct TargetState {
    live: Vec<Credential>,
    published: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    targets: HashMap<String, TargetState>,
    faults: HashMap<Stage, Fault>,
    calls: CallCounts,
    next_id: u64,
}

/// An in-memory backend.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    backend: BackendKind,
    capabilities: Capabilities,
    live_limit: Option<usize>,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryProvider {
    /// Creates an empty backend of the given kind with its default capabilities.
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            capabilities: backend.default_capabilities(),
            live_limit: None,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Overrides the declared capabilities.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Caps the number of live credentials per target, like IAM's two keys per user.
    #[must_use]
    pub const fn with_live_limit(mut self, limit: usize) -> Self {
        self.live_limit = Some(limit);
        self
    }

    /// Installs an existing live credential for a target and marks it published.
    pub fn seed(&self, target: &str, credential: Credential) {
        let mut inner = self.inner.lock();
        let state = inner.targets.entry(target.to_string()).or_default();
        state.published.clone_from(&credential.identifier);
        state
            .live
            .push(credential.with_status(CredentialStatus::Active));
    }

    /// Makes every future call to `stage` fail with `fault`.
    pub fn inject(&self, stage: Stage, fault: Fault) {
        self.inner.lock().faults.insert(stage, fault);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.inner.lock().calls
    }

    /// Identifiers of the live credentials for a target.
    #[must_use]
    pub fn live_ids(&self, target: &str) -> Vec<String> {
        self.inner
            .lock()
            .targets
            .get(target)
            .map(|state| {
                state
                    .live
                    .iter()
                    .filter_map(|c| c.identifier.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Identifier of the credential dependents currently use.
    #[must_use]
    pub fn published_id(&self, target: &str) -> Option<String> {
        self.inner
            .lock()
            .targets
            .get(target)
            .and_then(|state| state.published.clone())
    }

    /// Secret of the published credential for a target.
    #[must_use]
    pub fn live_value(&self, target: &str) -> Option<SecretString> {
        let inner = self.inner.lock();
        let state = inner.targets.get(target)?;
        let published = state.published.as_deref()?;
        state
            .live
            .iter()
            .find(|c| c.identifier.as_deref() == Some(published))
            .and_then(|c| c.value.as_ref())
            .map(|v| v.secret().clone())
    }

    /// Records the call and returns the fault to apply, if any.
    fn enter(&self, stage: Stage, ctx: &RotationContext) -> Option<Fault> {
        debug!(
            rotation_id = %ctx.rotation_id,
            backend = %self.backend,
            stage = %stage,
            target = %ctx.target,
            "memory provider call"
        );
        let mut inner = self.inner.lock();
        inner.calls.bump(stage);
        inner.faults.get(&stage).cloned()
    }

    fn mint(&self, id: u64, value: Option<&SecretString>) -> ProviderResult<(String, CredentialValue)> {

        let minted = || {
            SecretGenerator::generic()
                .generate(&GenerationSpec::new(MINTED_LENGTH, Encoding::Alphanumeric))
                .map_err(|e| ProviderError::Rejected {
                    reason: e.to_string(),
                })
        };

        match self.backend {
            BackendKind::IamKeyStore => {
                let access_key_id = format!("AKIAMEMORY{id:010}");
                let secret = minted()?;
                Ok((
                    access_key_id.clone(),
                    CredentialValue::KeyPair {
                        access_key_id,
                        secret,
                    },
                ))
            }
            BackendKind::TokenIssuer => Ok((format!("tok-{id}"), CredentialValue::Single(minted()?))),
            BackendKind::SecretStore | BackendKind::DatabasePasswordStore => {
                let value = value.ok_or_else(|| ProviderError::Rejected {
                    reason: format!("{} requires a caller-supplied value", self.backend),
                })?;
                Ok((format!("version-{id}"), CredentialValue::Single(value.clone())))
            }
        }
    }

    fn apply_create(
        &self,
        ctx: &RotationContext,
        value: Option<&SecretString>,
    ) -> ProviderResult<Credential> {
        // Cap check and insert happen under one guard.
        let mut inner = self.inner.lock();
        if let Some(limit) = self.live_limit {
            let live = inner
                .targets
                .get(ctx.target.as_str())
                .map_or(0, |state| state.live.len());
            if live >= limit {
                return Err(ProviderError::QuotaExceeded {
                    reason: format!("{} already has {live} live credentials (limit {limit})", ctx.target),
                });
            }
        }

        inner.next_id += 1;
        let (id, value) = self.mint(inner.next_id, value)?;
        let credential = Credential::pending(self.backend.credential_kind())
            .with_identifier(id)
            .with_value(value)
            .with_status(CredentialStatus::Active);

        let state = inner.targets.entry(ctx.target.to_string()).or_default();
        if self.capabilities.switch_in == SwitchIn::NotApplicable {
            state.published.clone_from(&credential.identifier);
        }
        state.live.push(credential.clone());

        Ok(credential)
    }

    fn apply_verify(&self, ctx: &RotationContext, credential: &Credential) -> bool {
        let inner = self.inner.lock();
        inner.targets.get(ctx.target.as_str()).is_some_and(|state| {
            state.live.iter().any(|live| {
                live.identifier.is_some()
                    && live.identifier == credential.identifier
                    && live.value == credential.value
            })
        })
    }

    fn apply_switch_in(&self, ctx: &RotationContext, credential: &Credential) -> ProviderResult<()> {
        let id = credential
            .identifier
            .clone()
            .ok_or_else(|| ProviderError::InvalidResponse {
                reason: "credential has no identifier".to_string(),
            })?;
        let mut inner = self.inner.lock();
        let state = inner
            .targets
            .get_mut(ctx.target.as_str())
            .ok_or_else(|| ProviderError::NotFound {
                target: ctx.target.to_string(),
            })?;
        if !state.live.iter().any(|c| c.identifier.as_deref() == Some(id.as_str())) {
            return Err(ProviderError::NotFound { target: id });
        }
        state.published = Some(id);
        Ok(())
    }

    fn apply_revoke(
        &self,
        ctx: &RotationContext,
        old: &Credential,
        new: &Credential,
    ) -> ProviderResult<()> {
        let keep = new.identifier.as_deref();
        let mut inner = self.inner.lock();
        let state = inner
            .targets
            .get_mut(ctx.target.as_str())
            .ok_or_else(|| ProviderError::NotFound {
                target: ctx.target.to_string(),
            })?;

        match old.identifier.as_deref() {
            Some(id) if Some(id) == keep => {
                return Err(ProviderError::Rejected {
                    reason: format!("{id} is the replacement credential"),
                });
            }
            Some(id) => {
                let before = state.live.len();
                state.live.retain(|c| c.identifier.as_deref() != Some(id));
                if state.live.len() == before {
                    return Err(ProviderError::NotFound {
                        target: id.to_string(),
                    });
                }
            }
            // Without an identifier the previous credential is every live one
            // except the replacement.
            None => {
                if keep.is_none() {
                    return Err(ProviderError::InvalidResponse {
                        reason: "neither credential has an identifier".to_string(),
                    });
                }
                state.live.retain(|c| c.identifier.as_deref() == keep);
            }
        }
        state.published = keep.map(str::to_string);
        Ok(())
    }
}

async fn trip<T>(fault: Fault) -> ProviderResult<T> {
    match fault {
        Fault::Error(error) => Err(error),
        Fault::RejectVerification => Err(ProviderError::Rejected {
            reason: "injected rejection".to_string(),
        }),
        Fault::Hang => std::future::pending().await,
    }
}

impl CredentialProvider for MemoryProvider {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create<'a>(
        &'a self,
        ctx: &'a RotationContext,
        value: Option<&'a SecretString>,
    ) -> ProviderFuture<'a, Credential> {
        Box::pin(async move {
            if let Some(fault) = self.enter(Stage::Create, ctx) {
                return trip(fault).await;
            }
            self.apply_create(ctx, value)
        })
    }

    fn verify<'a>(
        &'a self,
        ctx: &'a RotationContext,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            match self.enter(Stage::Verify, ctx) {
                Some(Fault::RejectVerification) => Ok(false),
                Some(fault) => trip(fault).await,
                None => Ok(self.apply_verify(ctx, credential)),
            }
        })
    }

    fn switch_in<'a>(
        &'a self,
        ctx: &'a RotationContext,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            if let Some(fault) = self.enter(Stage::SwitchIn, ctx) {
                return trip(fault).await;
            }
            self.apply_switch_in(ctx, credential)
        })
    }

    fn revoke<'a>(
        &'a self,
        ctx: &'a RotationContext,
        old: &'a Credential,
        new: &'a Credential,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            if let Some(fault) = self.enter(Stage::Revoke, ctx) {
                return trip(fault).await;
            }
            self.apply_revoke(ctx, old, new)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CredentialKind, Environment, Target};

    fn ctx(target: &str) -> RotationContext {
        RotationContext::new(
            Environment::new("dev").expect("valid"),
            Target::new(target).expect("valid"),
        )
    }

    #[tokio::test]
    async fn create_mints_key_pairs_for_iam() {
        let provider = MemoryProvider::new(BackendKind::IamKeyStore);
        let cred = provider.create(&ctx("ci"), None).await.expect("create");

        assert_eq!(cred.kind, CredentialKind::AccessKeyPair);
        let value = cred.value.expect("value");
        assert_eq!(value.access_key_id(), cred.identifier.as_deref());
        assert_eq!(value.secret().len(), MINTED_LENGTH);
        assert_eq!(provider.live_ids("ci").len(), 1);
    }

    #[tokio::test]
    async fn caller_supplied_backend_requires_value() {
        let provider = MemoryProvider::new(BackendKind::SecretStore);
        let err = provider.create(&ctx("app"), None).await.expect_err("no value");
        assert!(matches!(err, ProviderError::Rejected { .. }));

        let value = SecretString::new("supplied-value");
        let cred = provider
            .create(&ctx("app"), Some(&value))
            .await
            .expect("create");
        assert_eq!(cred.value.map(|v| v.secret().clone()), Some(value));
    }

    #[tokio::test]
    async fn live_limit_surfaces_as_quota_exceeded() {
        let provider = MemoryProvider::new(BackendKind::IamKeyStore).with_live_limit(2);
        provider.seed(
            "ci",
            Credential::active(CredentialKind::AccessKeyPair).with_identifier("AKIAOLD"),
        );
        provider.create(&ctx("ci"), None).await.expect("second key fits");

        let err = provider.create(&ctx("ci"), None).await.expect_err("limit hit");
        assert!(matches!(err, ProviderError::QuotaExceeded { .. }));
        assert_eq!(provider.calls().create, 2);
    }

    #[tokio::test]
    async fn switch_in_is_idempotent() {
        let provider = MemoryProvider::new(BackendKind::TokenIssuer);
        let c = ctx("gh-app");
        let cred = provider.create(&c, None).await.expect("create");

        provider.switch_in(&c, &cred).await.expect("first");
        provider.switch_in(&c, &cred).await.expect("second");
        assert_eq!(provider.published_id("gh-app"), cred.identifier);
        assert_eq!(provider.live_ids("gh-app").len(), 1);
    }

    #[tokio::test]
    async fn verify_detects_unknown_credential() {
        let provider = MemoryProvider::new(BackendKind::TokenIssuer);
        let c = ctx("gh-app");
        provider.create(&c, None).await.expect("create");
        let forged = Credential::active(CredentialKind::OpaqueToken)
            .with_identifier("tok-999")
            .with_value(CredentialValue::single("forged"));

        assert!(!provider.verify(&c, &forged).await.expect("answered"));
    }

    #[tokio::test]
    async fn revoke_without_identifier_drops_unpublished() {
        let provider = MemoryProvider::new(BackendKind::TokenIssuer);
        let c = ctx("gh-app");
        let old = provider.create(&c, None).await.expect("old");
        let new = provider.create(&c, None).await.expect("new");
        provider.switch_in(&c, &new).await.expect("publish");

        provider
            .revoke(&c, &Credential::active(CredentialKind::OpaqueToken), &new)
            .await
            .expect("revoke");
        let live = provider.live_ids("gh-app");
        assert_eq!(live, vec![new.identifier.clone().expect("id")]);
        assert!(!live.contains(&old.identifier.expect("id")));
    }

    #[tokio::test]
    async fn revoke_without_identifier_keeps_unpublished_replacement() {
        let provider = MemoryProvider::new(BackendKind::TokenIssuer);
        let c = ctx("gh-app");
        provider.seed(
            "gh-app",
            Credential::active(CredentialKind::OpaqueToken).with_identifier("old-1"),
        );
        let new = provider.create(&c, None).await.expect("new");

        provider
            .revoke(&c, &Credential::active(CredentialKind::OpaqueToken), &new)
            .await
            .expect("revoke");
        assert_eq!(provider.live_ids("gh-app"), vec![new.identifier.clone().expect("id")]);
        assert_eq!(provider.published_id("gh-app"), new.identifier);
    }

    #[tokio::test]
    async fn revoke_refuses_the_replacement() {
        let provider = MemoryProvider::new(BackendKind::TokenIssuer);
        let c = ctx("gh-app");
        let new = provider.create(&c, None).await.expect("new");

        let err = provider.revoke(&c, &new, &new).await.expect_err("same credential");
        assert!(matches!(err, ProviderError::Rejected { .. }));
        assert_eq!(provider.live_ids("gh-app").len(), 1);
    }

    #[tokio::test]
    async fn create_publishes_when_switch_in_not_applicable() {
        let provider = MemoryProvider::new(BackendKind::TokenIssuer).with_capabilities(
            BackendKind::TokenIssuer
                .default_capabilities()
                .with_switch_in(SwitchIn::NotApplicable),
        );
        let new = provider.create(&ctx("gh-app"), None).await.expect("new");
        assert_eq!(provider.published_id("gh-app"), new.identifier);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_respect_live_limit() {
        let provider = MemoryProvider::new(BackendKind::IamKeyStore).with_live_limit(2);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.create(&ctx("ci"), None).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.expect("task").is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 2);
        assert_eq!(provider.live_ids("ci").len(), 2);
    }

    #[tokio::test]
    async fn revoke_unknown_identifier_is_not_found() {
        let provider = MemoryProvider::new(BackendKind::IamKeyStore);
        let c = ctx("ci");
        let new = provider.create(&c, None).await.expect("create");
        let err = provider
            .revoke(
                &c,
                &Credential::active(CredentialKind::AccessKeyPair).with_identifier("AKIAGONE"),
                &new,
            )
            .await
            .expect_err("unknown");
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn injected_error_is_returned_and_counted() {
        let provider = MemoryProvider::new(BackendKind::IamKeyStore);
        provider.inject(
            Stage::Create,
            Fault::Error(ProviderError::Unauthorized {
                reason: "expired session".to_string(),
            }),
        );
        let err = provider.create(&ctx("ci"), None).await.expect_err("fault");
        assert!(matches!(err, ProviderError::Unauthorized { .. }));
        assert_eq!(provider.calls().create, 1);
        assert!(provider.live_ids("ci").is_empty());

        provider.clear_faults();
        assert!(provider.create(&ctx("ci"), None).await.is_ok());
    }
}
