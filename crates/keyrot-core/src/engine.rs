//! The rotation state machine.
//!
//! [`RotationEngine::rotate`] drives one provider through
//! create, verify, switch-in and revoke, strictly in that order. A credential
//! is never revoked until its replacement has been proven operable, or the
//! backend has explicitly declared it cannot verify.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, ProviderError, Result};
use crate::generator::{DEFAULT_LENGTH, Encoding, GenerationSpec, SecretGenerator};
use crate::provider::{
    BackendKind, Capabilities, CredentialProvider, ProviderFuture, SwitchIn, ValueSource,
    VerifySupport,
};
use crate::result::{OldCredentialStatus, Outcome, RotationResult, Verification};
use crate::state::{RotationState, Stage};
use crate::types::{
    Credential, CredentialStatus, CredentialValue, RotationContext, RotationRequest, SecretString,
};

/// Runs rotations against a single credential provider.
///
/// The engine holds no state between rotations. Rotations of different
/// targets may run concurrently on one engine; the caller must serialize
/// rotations of the same target.
#[derive(Clone)]
pub struct RotationEngine {
    provider: Arc<dyn CredentialProvider>,
    config: EngineConfig,
    generator: SecretGenerator,
}

impl std::fmt::Debug for RotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationEngine")
            .field("backend", &self.provider.backend())
            .field("config", &self.config)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

impl RotationEngine {
    /// Creates an engine with default configuration and the backend's generator.
    #[must_use]
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        let generator = provider.backend().generator();
        Self {
            provider,
            config: EngineConfig::default(),
            generator,
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub const fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the generator, e.g. to raise the minimum length.
    ///
    /// The minimum is never lowered below the backend's own floor.
    #[must_use]
    pub fn with_generator(mut self, generator: SecretGenerator) -> Self {
        let floor = self.provider.backend().generator().min_length();
        self.generator = if generator.min_length() < floor {
            SecretGenerator::new(floor)
        } else {
            generator
        };
        self
    }

    /// The backend this engine drives.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.provider.backend()
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one rotation.
    ///
    /// Step failures are not errors: they come back as a [`RotationResult`]
    /// with [`Outcome::Failed`] or [`Outcome::PartialSuccess`] and enough
    /// detail to know what is safe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the request is rejected before any
    /// backend call.
    pub async fn rotate(&self, request: &RotationRequest) -> Result<RotationResult> {
        let backend = self.provider.backend();
        let capabilities = self.provider.capabilities();

        let new_value = self.prepare(backend, request)?;
        let old = request
            .current
            .clone()
            .unwrap_or_else(|| Credential::active(backend.credential_kind()));

        let ctx = RotationContext::new(request.environment.clone(), request.target.clone());
        let mut run = Run::new(ctx, backend, old);

        info!(
            rotation_id = %run.ctx.rotation_id,
            environment = %run.ctx.environment,
            target = %run.ctx.target,
            backend = %backend,
            "starting rotation"
        );

        let new = match self.create(&mut run, new_value.as_ref()).await {
            Ok(new) => new,
            Err(result) => return Ok(*result),
        };

        let new = match self.verify(&mut run, capabilities, new).await {
            Ok(new) => new,
            Err(result) => return Ok(*result),
        };

        let new = match self.switch_in(&mut run, capabilities, new).await {
            Ok(new) => new,
            Err(result) => return Ok(*result),
        };

        Ok(self.revoke(run, new).await)
    }

    /// Validates the request and generates the new value when the caller supplies it.
    fn prepare(
        &self,
        backend: BackendKind,
        request: &RotationRequest,
    ) -> Result<Option<SecretString>> {
        if let Some(current) = &request.current {
            if current.kind != backend.credential_kind() {
                return Err(Error::validation(format!(
                    "current credential is a {} but {backend} rotates {}",
                    current.kind,
                    backend.credential_kind()
                )));
            }
        }

        match backend.value_source() {
            ValueSource::Caller => {
                let spec = request.generation.unwrap_or_else(|| {
                    GenerationSpec::new(
                        DEFAULT_LENGTH.max(self.generator.min_length()),
                        Encoding::default(),
                    )
                });
                self.generator.generate(&spec).map(Some)
            }
            ValueSource::Backend => {
                if let Some(spec) = &request.generation {
                    spec.validate(self.generator.min_length())?;
                    debug!(backend = %backend, "backend mints its own values; generation parameters unused");
                }
                Ok(None)
            }
        }
    }

    async fn step<T>(
        &self,
        stage: Stage,
        ctx: &RotationContext,
        call: ProviderFuture<'_, T>,
    ) -> Result<T> {
        debug!(
            rotation_id = %ctx.rotation_id,
            stage = %stage,
            timeout_ms = duration_ms(self.config.step_timeout()),
            "calling provider"
        );

        match timeout(self.config.step_timeout(), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(step_error(stage, &e)),
            Err(_) => Err(Error::Timeout {
                stage,
                timeout_ms: duration_ms(self.config.step_timeout()),
            }),
        }
    }

    async fn create(
        &self,
        run: &mut Run,
        value: Option<&SecretString>,
    ) -> std::result::Result<Credential, Box<RotationResult>> {
        let created = self
            .step(
                Stage::Create,
                &run.ctx,
                self.provider.create(&run.ctx, value),
            )
            .await;

        let mut new = match created {
            Ok(new) => new,
            Err(error) => {
                warn!(
                    rotation_id = %run.ctx.rotation_id,
                    stage = %Stage::Create,
                    error = %error,
                    "create failed; old credential untouched"
                );
                if matches!(error, Error::Timeout { .. }) {
                    run.warnings.push(format!(
                        "create timed out; the backend may have minted a credential for {} that nothing uses. Check before retrying.",
                        run.ctx.target
                    ));
                }
                return Err(Box::new(run.failed(Stage::Create, error, None)));
            }
        };

        if !new.has_value() {
            if let Some(value) = value {
                new.value = Some(match new.value.take() {
                    Some(CredentialValue::KeyPair { access_key_id, .. }) => {
                        CredentialValue::KeyPair {
                            access_key_id,
                            secret: value.clone(),
                        }
                    }
                    _ => CredentialValue::Single(value.clone()),
                });
            }
        }

        if !new.has_value() {
            let error = Error::at_stage(Stage::Create, "backend returned no credential value");
            warn!(
                rotation_id = %run.ctx.rotation_id,
                credential_id = new.display_id(),
                "backend created a credential without returning its value"
            );
            run.warnings.push(format!(
                "backend created credential {} without returning its value; revoke it manually. The old credential remains active.",
                new.display_id()
            ));
            let stray = new.with_status(CredentialStatus::Orphaned);
            return Err(Box::new(run.failed(Stage::Create, error, Some(&stray))));
        }

        run.advance(Stage::Create, &new);
        Ok(new)
    }

    async fn verify(
        &self,
        run: &mut Run,
        capabilities: Capabilities,
        new: Credential,
    ) -> std::result::Result<Credential, Box<RotationResult>> {
        if capabilities.verify == VerifySupport::Unsupported {
            warn!(
                rotation_id = %run.ctx.rotation_id,
                backend = %run.backend,
                credential_id = new.display_id(),
                "backend has no verification primitive; treating new credential as verified"
            );
            run.warnings.push(format!(
                "verification skipped: {} declares no verification primitive",
                run.backend
            ));
            run.verification = Verification::Skipped;
            let new = new.with_status(CredentialStatus::Verified);
            run.advance(Stage::Verify, &new);
            return Ok(new);
        }

        let verified = self
            .step(
                Stage::Verify,
                &run.ctx,
                self.provider.verify(&run.ctx, &new),
            )
            .await
            .and_then(|usable| {
                if usable {
                    Ok(())
                } else {
                    Err(Error::at_stage(
                        Stage::Verify,
                        "backend reports the new credential is not usable",
                    ))
                }
            });

        match verified {
            Ok(()) => {
                run.verification = Verification::Passed;
                let new = new.with_status(CredentialStatus::Verified);
                run.advance(Stage::Verify, &new);
                Ok(new)
            }
            Err(error) => {
                run.verification = Verification::Failed;
                warn!(
                    rotation_id = %run.ctx.rotation_id,
                    stage = %Stage::Verify,
                    credential_id = new.display_id(),
                    error = %error,
                    "verification failed; new credential left unused"
                );
                run.warnings.push(format!(
                    "new credential {} was created but failed verification and is unused; revoke it manually. The old credential {} remains active.",
                    new.display_id(),
                    run.old.display_id()
                ));
                let stray = new.with_status(CredentialStatus::Orphaned);
                Err(Box::new(run.failed(Stage::Verify, error, Some(&stray))))
            }
        }
    }

    async fn switch_in(
        &self,
        run: &mut Run,
        capabilities: Capabilities,
        new: Credential,
    ) -> std::result::Result<Credential, Box<RotationResult>> {
        if capabilities.switch_in == SwitchIn::NotApplicable {
            debug!(
                rotation_id = %run.ctx.rotation_id,
                backend = %run.backend,
                "create already activated the new credential; no switch-in needed"
            );
            let new = new.with_status(CredentialStatus::SwitchedIn);
            run.advance(Stage::SwitchIn, &new);
            return Ok(new);
        }

        let switched = self
            .step(
                Stage::SwitchIn,
                &run.ctx,
                self.provider.switch_in(&run.ctx, &new),
            )
            .await;

        match switched {
            Ok(()) => {
                let new = new.with_status(CredentialStatus::SwitchedIn);
                run.advance(Stage::SwitchIn, &new);
                Ok(new)
            }
            Err(error) => {
                warn!(
                    rotation_id = %run.ctx.rotation_id,
                    stage = %Stage::SwitchIn,
                    credential_id = new.display_id(),
                    error = %error,
                    "switch-in failed; two valid credentials exist"
                );
                run.warnings.push(format!(
                    "two valid credentials now exist for {}: old {} and new {}. Manual reconciliation is required; dependents may hold either value.",
                    run.ctx.target,
                    run.old.display_id(),
                    new.display_id()
                ));
                let stray = new.with_status(CredentialStatus::Orphaned);
                Err(Box::new(run.failed(Stage::SwitchIn, error, Some(&stray))))
            }
        }
    }

    async fn revoke(&self, mut run: Run, new: Credential) -> RotationResult {
        let revoked = self
            .step(
                Stage::Revoke,
                &run.ctx,
                self.provider.revoke(&run.ctx, &run.old, &new),
            )
            .await;

        match revoked {
            Ok(()) => {
                run.old.status = CredentialStatus::Revoked;
                run.advance(Stage::Revoke, &new);
                info!(
                    rotation_id = %run.ctx.rotation_id,
                    environment = %run.ctx.environment,
                    target = %run.ctx.target,
                    credential_id = new.display_id(),
                    "rotation complete"
                );
                run.finish(
                    Outcome::Success,
                    Some(new),
                    OldCredentialStatus::Revoked,
                    None,
                )
            }
            Err(error) => {
                let old_status = if matches!(error, Error::Timeout { .. }) {
                    OldCredentialStatus::Unknown
                } else {
                    OldCredentialStatus::StillActive
                };
                warn!(
                    rotation_id = %run.ctx.rotation_id,
                    stage = %Stage::Revoke,
                    credential_id = run.old.display_id(),
                    error = %error,
                    "revoke failed; new credential is live, old credential needs cleanup"
                );
                run.warnings.push(format!(
                    "old credential {} was not revoked ({old_status}); the new credential {} is live. Clean up the old credential out of band.",
                    run.old.display_id(),
                    new.display_id()
                ));
                run.finish(
                    Outcome::PartialSuccess,
                    Some(new),
                    old_status,
                    Some((Stage::Revoke, error)),
                )
            }
        }
    }
}

/// Bookkeeping for one rotation in flight.
struct Run {
    ctx: RotationContext,
    backend: BackendKind,
    old: Credential,
    state: RotationState,
    trace: Vec<RotationState>,
    verification: Verification,
    warnings: Vec<String>,
    started_at: chrono::DateTime<Utc>,
}

impl Run {
    fn new(ctx: RotationContext, backend: BackendKind, old: Credential) -> Self {
        Self {
            ctx,
            backend,
            old,
            state: RotationState::Start,
            trace: vec![RotationState::Start],
            verification: Verification::NotReached,
            warnings: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn advance(&mut self, stage: Stage, credential: &Credential) {
        if let Some(next) = self.state.advance(stage) {
            self.state = next;
            self.trace.push(next);
            info!(
                rotation_id = %self.ctx.rotation_id,
                environment = %self.ctx.environment,
                target = %self.ctx.target,
                stage = %stage,
                credential_id = credential.display_id(),
                state = %next,
                "rotation advanced"
            );
        }
    }

    /// Result for a failure before the new credential went live.
    fn failed(&mut self, stage: Stage, error: Error, stray: Option<&Credential>) -> RotationResult {
        let mut result = self.take_result(
            Outcome::Failed,
            None,
            OldCredentialStatus::StillActive,
            Some((stage, error)),
        );
        result.stray_credential = stray.map(Credential::redacted);
        result
    }

    fn finish(
        mut self,
        outcome: Outcome,
        new: Option<Credential>,
        old_status: OldCredentialStatus,
        failure: Option<(Stage, Error)>,
    ) -> RotationResult {
        self.take_result(outcome, new, old_status, failure)
    }

    fn take_result(
        &mut self,
        outcome: Outcome,
        new: Option<Credential>,
        old_status: OldCredentialStatus,
        failure: Option<(Stage, Error)>,
    ) -> RotationResult {
        let (failure_stage, error) = match failure {
            Some((stage, error)) => (Some(stage), Some(error)),
            None => (None, None),
        };

        RotationResult {
            rotation_id: self.ctx.rotation_id,
            environment: self.ctx.environment.clone(),
            target: self.ctx.target.clone(),
            backend: self.backend,
            outcome,
            new_credential: new,
            stray_credential: None,
            old_credential: self.old.redacted(),
            old_credential_status: old_status,
            failure_stage,
            error,
            verification: self.verification,
            trace: std::mem::take(&mut self.trace),
            warnings: std::mem::take(&mut self.warnings),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

fn step_error(stage: Stage, error: &ProviderError) -> Error {
    match error {
        // Surfaces as a normal create failure when concurrent rotations collide
        // at the backend's live-credential limit.
        ProviderError::QuotaExceeded { .. } if stage == Stage::Create => {
            Error::at_stage(stage, format!("{error}; another rotation of this target may be in flight"))
        }
        _ => Error::at_stage(stage, error.to_string()),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryProvider};
    use crate::types::{CredentialKind, Environment, Target};

    fn request() -> RotationRequest {
        RotationRequest::new(
            Environment::new("dev").expect("valid"),
            Target::new("svc-deploy").expect("valid"),
        )
    }

    fn engine(provider: &Arc<MemoryProvider>) -> RotationEngine {
        RotationEngine::new(Arc::clone(provider) as Arc<dyn CredentialProvider>).with_config(
            EngineConfig::new(Duration::from_millis(200)).expect("non-zero"),
        )
    }

    #[tokio::test]
    async fn successful_rotation_walks_every_state() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::IamKeyStore));
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.old_credential_status, OldCredentialStatus::Revoked);
        assert_eq!(
            result.trace,
            vec![
                RotationState::Start,
                RotationState::Created,
                RotationState::Verified,
                RotationState::SwitchedIn,
                RotationState::Revoked,
            ]
        );
        assert_eq!(result.verification, Verification::Passed);
        assert!(result.warnings.is_empty());
        let new = result.new_credential.expect("new credential");
        assert_eq!(new.status, CredentialStatus::SwitchedIn);
        assert!(new.value.as_ref().and_then(CredentialValue::access_key_id).is_some());
    }

    #[tokio::test]
    async fn caller_supplied_value_reaches_provider() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::DatabasePasswordStore));
        let req = request().with_generation(GenerationSpec::new(20, Encoding::Hex));
        let result = engine(&provider).rotate(&req).await.expect("valid request");

        let new = result.new_credential.expect("new credential");
        let value = new.value.expect("value");
        assert_eq!(value.secret().len(), 20);
        assert!(value.secret().expose().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            provider.live_value("svc-deploy").as_ref(),
            Some(value.secret())
        );
    }

    #[tokio::test]
    async fn short_length_rejected_before_backend_call() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::DatabasePasswordStore));
        let req = request().with_generation(GenerationSpec::new(11, Encoding::Alphanumeric));
        let err = engine(&provider).rotate(&req).await.expect_err("too short");

        assert!(err.is_validation());
        assert_eq!(provider.calls().total(), 0);
    }

    #[tokio::test]
    async fn mismatched_current_credential_kind_rejected() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::IamKeyStore));
        let req = request().with_current(Credential::active(CredentialKind::Password));
        let err = engine(&provider).rotate(&req).await.expect_err("kind mismatch");

        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(provider.calls().total(), 0);
    }

    #[tokio::test]
    async fn verification_rejection_preserves_old_credential() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::TokenIssuer));
        provider.inject(Stage::Verify, Fault::RejectVerification);
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failure_stage, Some(Stage::Verify));
        assert_eq!(result.verification, Verification::Failed);
        assert_eq!(result.old_credential_status, OldCredentialStatus::StillActive);
        let stray = result.stray_credential.expect("orphaned new credential");
        assert_eq!(stray.status, CredentialStatus::Orphaned);
        assert!(stray.value.is_none());
        assert!(!result.warnings.is_empty());
        assert_eq!(provider.calls().switch_in, 0);
        assert_eq!(provider.calls().revoke, 0);
    }

    #[tokio::test]
    async fn skipped_verification_is_recorded_with_warning() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::SecretStore));
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.verification, Verification::Skipped);
        assert_eq!(provider.calls().verify, 0);
        assert!(result.warnings.iter().any(|w| w.contains("verification skipped")));
    }

    #[tokio::test]
    async fn switch_in_not_applicable_still_records_state() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::TokenIssuer).with_capabilities(
            BackendKind::TokenIssuer
                .default_capabilities()
                .with_switch_in(SwitchIn::NotApplicable),
        ));
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.trace.contains(&RotationState::SwitchedIn));
        assert_eq!(provider.calls().switch_in, 0);
        let new_id = result
            .new_credential
            .and_then(|c| c.identifier)
            .expect("new identifier");
        assert_eq!(provider.live_ids("svc-deploy"), vec![new_id]);
    }

    #[tokio::test]
    async fn anonymous_old_credential_revoke_keeps_replacement() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::TokenIssuer).with_capabilities(
            BackendKind::TokenIssuer
                .default_capabilities()
                .with_switch_in(SwitchIn::NotApplicable),
        ));
        provider.seed(
            "svc-deploy",
            Credential::active(CredentialKind::OpaqueToken).with_identifier("old-1"),
        );
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Success);
        let new_id = result
            .new_credential
            .and_then(|c| c.identifier)
            .expect("new identifier");
        assert_eq!(provider.live_ids("svc-deploy"), vec![new_id.clone()]);
        assert_eq!(provider.published_id("svc-deploy"), Some(new_id));
    }

    #[tokio::test]
    async fn default_length_follows_raised_minimum() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::DatabasePasswordStore));
        let result = engine(&provider)
            .with_generator(SecretGenerator::new(40))
            .rotate(&request())
            .await
            .expect("valid request");

        assert_eq!(result.outcome, Outcome::Success);
        let value = provider.live_value("svc-deploy").expect("published value");
        assert_eq!(value.len(), 40);
    }

    #[tokio::test]
    async fn create_timeout_warns_about_untracked_credential() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::IamKeyStore));
        provider.inject(Stage::Create, Fault::Hang);
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.old_credential_status, OldCredentialStatus::StillActive);
        assert!(matches!(
            result.error,
            Some(Error::Timeout {
                stage: Stage::Create,
                ..
            })
        ));
        assert!(result.warnings.iter().any(|w| w.contains("create timed out") && w.contains("svc-deploy")));
        let calls = provider.calls();
        assert_eq!((calls.create, calls.verify, calls.switch_in, calls.revoke), (1, 0, 0, 0));
    }

    /// Mints an identifier but never hands back the value.
    #[derive(Default)]
    struct ValuelessProvider {
        calls: parking_lot::Mutex<Vec<Stage>>,
    }

    impl CredentialProvider for ValuelessProvider {
        fn backend(&self) -> BackendKind {
            BackendKind::TokenIssuer
        }

        fn create<'a>(
            &'a self,
            _ctx: &'a RotationContext,
            _value: Option<&'a SecretString>,
        ) -> ProviderFuture<'a, Credential> {
            self.calls.lock().push(Stage::Create);
            Box::pin(async {
                Ok(Credential::active(CredentialKind::OpaqueToken).with_identifier("tok-stray"))
            })
        }

        fn verify<'a>(
            &'a self,
            _ctx: &'a RotationContext,
            _credential: &'a Credential,
        ) -> ProviderFuture<'a, bool> {
            self.calls.lock().push(Stage::Verify);
            Box::pin(async { Ok(true) })
        }

        fn switch_in<'a>(
            &'a self,
            _ctx: &'a RotationContext,
            _credential: &'a Credential,
        ) -> ProviderFuture<'a, ()> {
            self.calls.lock().push(Stage::SwitchIn);
            Box::pin(async { Ok(()) })
        }

        fn revoke<'a>(
            &'a self,
            _ctx: &'a RotationContext,
            _old: &'a Credential,
            _new: &'a Credential,
        ) -> ProviderFuture<'a, ()> {
            self.calls.lock().push(Stage::Revoke);
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn create_without_value_reports_stray_credential() {
        let provider = Arc::new(ValuelessProvider::default());
        let engine = RotationEngine::new(Arc::clone(&provider) as Arc<dyn CredentialProvider>);
        let result = engine.rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failure_stage, Some(Stage::Create));
        assert_eq!(result.old_credential_status, OldCredentialStatus::StillActive);
        assert!(matches!(result.error, Some(Error::CreateFailed { .. })));
        let stray = result.stray_credential.expect("stray credential");
        assert_eq!(stray.identifier.as_deref(), Some("tok-stray"));
        assert_eq!(stray.status, CredentialStatus::Orphaned);
        assert!(result.warnings.iter().any(|w| w.contains("tok-stray") && w.contains("revoke it manually")));
        assert_eq!(*provider.calls.lock(), vec![Stage::Create]);
    }

    #[tokio::test]
    async fn hanging_step_times_out() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::IamKeyStore));
        provider.inject(Stage::SwitchIn, Fault::Hang);
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::Failed);
        assert!(matches!(
            result.error,
            Some(Error::Timeout {
                stage: Stage::SwitchIn,
                ..
            })
        ));
        assert!(result.both_credentials_extant());
        assert_eq!(provider.calls().revoke, 0);
    }

    #[tokio::test]
    async fn revoke_timeout_leaves_old_status_unknown() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::IamKeyStore));
        provider.inject(Stage::Revoke, Fault::Hang);
        let result = engine(&provider).rotate(&request()).await.expect("valid request");

        assert_eq!(result.outcome, Outcome::PartialSuccess);
        assert_eq!(result.old_credential_status, OldCredentialStatus::Unknown);
    }

    #[tokio::test]
    async fn old_credential_value_never_reported() {
        let provider = Arc::new(MemoryProvider::new(BackendKind::DatabasePasswordStore));
        let current = Credential::active(CredentialKind::Password)
            .with_identifier("db-user")
            .with_value(CredentialValue::single("old-password-value"));
        provider.seed("svc-deploy", current.clone());
        let result = engine(&provider)
            .rotate(&request().with_current(current))
            .await
            .expect("valid request");

        assert_eq!(result.old_credential.identifier.as_deref(), Some("db-user"));
        assert!(result.old_credential.value.is_none());
        assert_eq!(result.old_credential.status, CredentialStatus::Revoked);
    }

    #[test]
    fn generator_floor_cannot_be_lowered() {
        let provider: Arc<dyn CredentialProvider> =
            Arc::new(MemoryProvider::new(BackendKind::DatabasePasswordStore));
        let engine = RotationEngine::new(provider).with_generator(SecretGenerator::new(4));
        assert_eq!(engine.generator.min_length(), 12);
    }
}
