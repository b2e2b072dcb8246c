//! Caller-facing rendering of a [`RotationResult`].
//!
//! The report is the output data contract: success flag, new credential id
//! and value, old credential status, and what the operator has to do next.
//! The new value is masked unless the caller explicitly asks for it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Error;
use crate::provider::BackendKind;
use crate::result::{OldCredentialStatus, Outcome, RotationResult, Verification};
use crate::state::{RotationState, Stage};

/// Placeholder printed instead of a masked value.
pub const MASK: &str = "********";

/// Serializable summary of one rotation.
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    /// Unique id of the rotation.
    pub rotation_id: Uuid,
    /// Environment the rotation ran in.
    pub environment: String,
    /// Target that was rotated.
    pub target: String,
    /// Backend variant.
    pub backend: BackendKind,
    /// Overall classification.
    pub outcome: Outcome,
    /// True only for [`Outcome::Success`].
    pub success: bool,
    /// Exit status for a CLI wrapper.
    pub exit_code: u8,
    /// Handle of the new credential.
    pub new_credential_id: Option<String>,
    /// Public half of a new key pair.
    pub new_access_key_id: Option<String>,
    /// The new value, or [`MASK`].
    pub new_credential_value: Option<String>,
    /// Handle of the credential that was replaced.
    pub old_credential_id: Option<String>,
    /// What to assume about the replaced credential.
    pub old_credential_status: OldCredentialStatus,
    /// Handle of an unused new credential left by a failed rotation.
    pub stray_credential_id: Option<String>,
    /// How verification ended.
    pub verification: Verification,
    /// The step that failed.
    pub failure_stage: Option<Stage>,
    /// The step error.
    pub error: Option<Error>,
    /// States reached.
    pub trace: Vec<RotationState>,
    /// Operator warnings.
    pub warnings: Vec<String>,
    /// Remediation for the failure, if any.
    pub guidance: Option<String>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: i64,
}

impl RotationReport {
    /// Builds a report; the new value is included only when `reveal` is set.
    #[must_use]
    pub fn new(result: &RotationResult, reveal: bool) -> Self {
        let new = result.new_credential.as_ref();
        let new_value = new.and_then(|c| c.value.as_ref());

        Self {
            rotation_id: result.rotation_id,
            environment: result.environment.to_string(),
            target: result.target.to_string(),
            backend: result.backend,
            outcome: result.outcome,
            success: result.is_success(),
            exit_code: result.exit_code(),
            new_credential_id: new.and_then(|c| c.identifier.clone()),
            new_access_key_id: new_value.and_then(|v| v.access_key_id().map(str::to_string)),
            new_credential_value: new_value.map(|v| {
                if reveal {
                    v.secret().expose().to_string()
                } else {
                    MASK.to_string()
                }
            }),
            old_credential_id: result.old_credential.identifier.clone(),
            old_credential_status: result.old_credential_status,
            stray_credential_id: result
                .stray_credential
                .as_ref()
                .and_then(|c| c.identifier.clone()),
            verification: result.verification,
            failure_stage: result.failure_stage,
            error: result.error.clone(),
            trace: result.trace.clone(),
            warnings: result.warnings.clone(),
            guidance: guidance(result),
            started_at: result.started_at,
            finished_at: result.finished_at,
            duration_ms: result.duration().num_milliseconds(),
        }
    }

    /// Returns true if the new value is present in clear.
    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.new_credential_value
            .as_deref()
            .is_some_and(|value| value != MASK)
    }
}

/// Remediation advice for a failed or partially successful rotation.
#[must_use]
pub fn guidance(result: &RotationResult) -> Option<String> {
    let stray = result
        .stray_credential
        .as_ref()
        .map_or("<unassigned>", |c| c.display_id());
    let old = result.old_credential.display_id();

    let advice = match result.failure_stage? {
        Stage::Create => match (&result.error, &result.stray_credential) {
            (Some(Error::Timeout { .. }), _) => format!(
                "Create timed out. Check {} for a credential minted by this attempt before retrying; the old credential was not touched.",
                result.target
            ),
            (_, Some(_)) => format!(
                "The backend created {stray} but did not return its value, so nothing can use it. Revoke it manually; the old credential {old} is still active."
            ),
            _ => "Nothing changed on the backend. Fix the cause and rerun; the old credential was not touched.".to_string(),
        },
        Stage::Verify => format!(
            "The new credential {stray} does not work and nothing uses it. Revoke it manually; the old credential {old} is still active."
        ),
        Stage::SwitchIn => format!(
            "Two valid credentials exist: old {old} and new {stray}. Dependents may hold either. Reconcile them onto one credential, then revoke the other."
        ),
        Stage::Revoke => format!(
            "The new credential is live. The old credential {old} was not revoked ({}); revoke it out of band.",
            result.old_credential_status
        ),
    };
    Some(advice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Credential, CredentialKind, CredentialStatus, CredentialValue, Environment, Target,
    };

    fn base(outcome: Outcome) -> RotationResult {
        let now = Utc::now();
        RotationResult {
            rotation_id: Uuid::new_v4(),
            environment: Environment::new("prod").expect("valid"),
            target: Target::new("deploy-bot").expect("valid"),
            backend: BackendKind::IamKeyStore,
            outcome,
            new_credential: None,
            stray_credential: None,
            old_credential: Credential::active(CredentialKind::AccessKeyPair)
                .with_identifier("AKIAOLD"),
            old_credential_status: OldCredentialStatus::StillActive,
            failure_stage: None,
            error: None,
            verification: Verification::Passed,
            trace: vec![RotationState::Start],
            warnings: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn new_credential() -> Credential {
        Credential::active(CredentialKind::AccessKeyPair)
            .with_identifier("AKIANEW")
            .with_value(CredentialValue::key_pair("AKIANEW", "very-secret-value"))
            .with_status(CredentialStatus::SwitchedIn)
    }

    #[test]
    fn value_is_masked_by_default() {
        let mut result = base(Outcome::Success);
        result.old_credential_status = OldCredentialStatus::Revoked;
        result.new_credential = Some(new_credential());

        let report = RotationReport::new(&result, false);
        assert_eq!(report.new_credential_value.as_deref(), Some(MASK));
        assert_eq!(report.new_access_key_id.as_deref(), Some("AKIANEW"));
        assert!(!report.is_revealed());
        assert!(report.guidance.is_none());

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(!json.contains("very-secret-value"));
    }

    #[test]
    fn reveal_includes_value() {
        let mut result = base(Outcome::PartialSuccess);
        result.new_credential = Some(new_credential());
        result.failure_stage = Some(Stage::Revoke);

        let report = RotationReport::new(&result, true);
        assert_eq!(
            report.new_credential_value.as_deref(),
            Some("very-secret-value")
        );
        assert_eq!(report.exit_code, 2);
        assert!(!report.success);
        assert!(report.guidance.expect("guidance").contains("AKIAOLD"));
    }

    #[test]
    fn switch_failure_guidance_names_both_credentials() {
        let mut result = base(Outcome::Failed);
        result.failure_stage = Some(Stage::SwitchIn);
        result.stray_credential = Some(new_credential().redacted());

        let advice = guidance(&result).expect("guidance");
        assert!(advice.contains("AKIAOLD"));
        assert!(advice.contains("AKIANEW"));
        assert_eq!(
            RotationReport::new(&result, false)
                .stray_credential_id
                .as_deref(),
            Some("AKIANEW")
        );
    }

    #[test]
    fn create_timeout_guidance_mentions_stray_check() {
        let mut result = base(Outcome::Failed);
        result.failure_stage = Some(Stage::Create);
        result.error = Some(Error::Timeout {
            stage: Stage::Create,
            timeout_ms: 30_000,
        });

        let advice = guidance(&result).expect("guidance");
        assert!(advice.contains("deploy-bot"));
    }

    #[test]
    fn create_without_value_guidance_names_stray() {
        let mut result = base(Outcome::Failed);
        result.failure_stage = Some(Stage::Create);
        result.error = Some(Error::at_stage(Stage::Create, "backend returned no credential value"));
        result.stray_credential = Some(
            Credential::active(CredentialKind::OpaqueToken)
                .with_identifier("tok-stray")
                .with_status(CredentialStatus::Orphaned),
        );

        let advice = guidance(&result).expect("guidance");
        assert!(advice.contains("tok-stray"));
        assert!(advice.contains("Revoke it manually"));
        assert!(!advice.contains("Nothing changed"));
    }

    #[test]
    fn plain_create_failure_guidance_says_nothing_changed() {
        let mut result = base(Outcome::Failed);
        result.failure_stage = Some(Stage::Create);
        result.error = Some(Error::at_stage(Stage::Create, "AccessDenied"));

        let advice = guidance(&result).expect("guidance");
        assert!(advice.contains("Nothing changed"));
    }

    #[test]
    fn error_serializes_with_kind_tag() {
        let mut result = base(Outcome::Failed);
        result.failure_stage = Some(Stage::Verify);
        result.error = Some(Error::at_stage(Stage::Verify, "denied"));

        let json = serde_json::to_value(RotationReport::new(&result, false)).expect("serialize");
        assert_eq!(json["error"]["kind"], "verify_failed");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["failure_stage"], "verify");
        assert!(json["new_credential_value"].is_null());
    }
}
