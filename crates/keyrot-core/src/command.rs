//! Credential provider that runs external hook programs.
//!
//! Each primitive maps to one configured argv. Inputs are passed through the
//! environment rather than argv so values never show up in process listings:
//!
//! | variable                       | set for                     |
//! |--------------------------------|-----------------------------|
//! | `KEYROT_ROTATION_ID`           | every hook                  |
//! | `KEYROT_BACKEND`               | every hook                  |
//! | `KEYROT_ENVIRONMENT`           | every hook                  |
//! | `KEYROT_TARGET`                | every hook                  |
//! | `KEYROT_NEW_VALUE`             | create (caller-supplied)    |
//! | `KEYROT_CREDENTIAL_ID`         | verify, switch_in           |
//! | `KEYROT_CREDENTIAL_VALUE`      | verify, switch_in           |
//! | `KEYROT_ACCESS_KEY_ID`         | verify, switch_in (pairs)   |
//! | `KEYROT_OLD_CREDENTIAL_ID`     | revoke                      |
//! | `KEYROT_OLD_CREDENTIAL_VALUE`  | revoke, when known          |
//! | `KEYROT_NEW_CREDENTIAL_ID`     | revoke; must not be revoked |
//!
//! plus the `vars` of the environment the rotation runs in.
//!
//! `create` prints one JSON object on stdout: `{"id": "..", "value": ".."}`
//! or `{"id": "..", "access_key_id": "..", "secret": ".."}`. `verify` exits 0
//! when the credential works and 1 when it does not.

use std::collections::BTreeMap;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;
use zeroize::Zeroize;

use crate::config::{BackendConfig, HookSet};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BackendKind, Capabilities, CredentialProvider, ProviderFuture};
use crate::state::Stage;
use crate::types::{Credential, CredentialStatus, CredentialValue, RotationContext, SecretString};

/// Exit status of a verify hook that rejected the credential.
pub const VERIFY_REJECTED_EXIT: i32 = 1;

/// What a create hook prints.
#[derive(Deserialize)]
struct CreateOutput {
    id: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    access_key_id: Option<String>,
    #[serde(default)]
    secret: Option<String>,
}

struct HookOutput {
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: String,
}

impl HookOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn failure(&self, stage: Stage) -> ProviderError {
        ProviderError::Rejected {
            reason: self.describe(stage),
        }
    }

    fn describe(&self, stage: Stage) -> String {
        let status = self
            .code
            .map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
        if self.stderr.is_empty() {
            format!("{stage} hook exited with {status}")
        } else {
            format!("{stage} hook exited with {status}: {}", self.stderr)
        }
    }
}

impl Drop for HookOutput {
    fn drop(&mut self) {
        self.stdout.zeroize();
    }
}

/// Drives a backend through configured hook programs.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    backend: BackendKind,
    capabilities: Capabilities,
    hooks: HookSet,
    environment_vars: BTreeMap<String, BTreeMap<String, String>>,
}

impl CommandProvider {
    /// Creates a provider with the backend's default capabilities.
    #[must_use]
    pub fn new(backend: BackendKind, hooks: HookSet) -> Self {
        Self {
            backend,
            capabilities: backend.default_capabilities(),
            hooks,
            environment_vars: BTreeMap::new(),
        }
    }

    /// Creates a provider from a validated backend entry.
    #[must_use]
    pub fn from_config(
        config: &BackendConfig,
        environment_vars: BTreeMap<String, BTreeMap<String, String>>,
    ) -> Self {
        Self {
            backend: config.kind,
            capabilities: config.capabilities(),
            hooks: config.hooks.clone(),
            environment_vars,
        }
    }

    /// Overrides the declared capabilities.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the variables handed to hooks for rotations in `environment`.
    #[must_use]
    pub fn with_environment_vars(
        mut self,
        environment: impl Into<String>,
        vars: BTreeMap<String, String>,
    ) -> Self {
        self.environment_vars.insert(environment.into(), vars);
        self
    }

    fn argv(&self, stage: Stage) -> ProviderResult<&[String]> {
        let argv = match stage {
            Stage::Create => self.hooks.create.as_deref(),
            Stage::Verify => self.hooks.verify.as_deref(),
            Stage::SwitchIn => self.hooks.switch_in.as_deref(),
            Stage::Revoke => self.hooks.revoke.as_deref(),
        };
        match argv {
            Some(argv) if !argv.is_empty() => Ok(argv),
            _ => Err(ProviderError::Unsupported {
                operation: stage.to_string(),
            }),
        }
    }

    async fn run(
        &self,
        stage: Stage,
        ctx: &RotationContext,
        inputs: Vec<(&'static str, String)>,
    ) -> ProviderResult<HookOutput> {
        let argv = self.argv(stage)?;
        let (program, args) = argv.split_first().ok_or_else(|| ProviderError::Unsupported {
            operation: stage.to_string(),
        })?;

        debug!(
            rotation_id = %ctx.rotation_id,
            stage = %stage,
            program = %program,
            "running hook"
        );

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(vars) = self.environment_vars.get(ctx.environment.as_str()) {
            command.envs(vars);
        }
        command
            .env("KEYROT_ROTATION_ID", ctx.rotation_id.to_string())
            .env("KEYROT_BACKEND", self.backend.to_string())
            .env("KEYROT_ENVIRONMENT", ctx.environment.as_str())
            .env("KEYROT_TARGET", ctx.target.as_str());
        for (key, mut value) in inputs {
            command.env(key, &value);
            value.zeroize();
        }

        let output = command
            .output()
            .await
            .map_err(|e| ProviderError::Unavailable {
                reason: format!("failed to run {stage} hook '{program}': {e}"),
            })?;

        let code = output.status.code();
        debug!(
            rotation_id = %ctx.rotation_id,
            stage = %stage,
            code = ?code,
            "hook finished"
        );

        Ok(HookOutput {
            code,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            stdout: output.stdout,
        })
    }

    fn parse_created(
        &self,
        output: &HookOutput,
        supplied: Option<&SecretString>,
    ) -> ProviderResult<Credential> {
        let parsed: CreateOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| ProviderError::InvalidResponse {
                reason: format!("create hook printed invalid JSON: {e}"),
            })?;

        if parsed.id.trim().is_empty() {
            return Err(ProviderError::InvalidResponse {
                reason: "create hook returned an empty id".to_string(),
            });
        }

        let value = match (parsed.access_key_id, parsed.secret, parsed.value) {
            (Some(access_key_id), Some(secret), _) => CredentialValue::KeyPair {
                access_key_id,
                secret: SecretString::new(secret),
            },
            (None, None, Some(value)) => CredentialValue::Single(SecretString::new(value)),
            (None, None, None) => match supplied {
                Some(value) => CredentialValue::Single(value.clone()),
                None => {
                    return Err(ProviderError::InvalidResponse {
                        reason: "create hook returned no credential value".to_string(),
                    });
                }
            },
            _ => {
                return Err(ProviderError::InvalidResponse {
                    reason: "create hook must print both access_key_id and secret".to_string(),
                });
            }
        };

        Ok(Credential::pending(self.backend.credential_kind())
            .with_identifier(parsed.id)
            .with_value(value)
            .with_status(CredentialStatus::Active))
    }
}

fn credential_inputs(credential: &Credential) -> Vec<(&'static str, String)> {
    let mut inputs = Vec::with_capacity(3);
    if let Some(id) = &credential.identifier {
        inputs.push(("KEYROT_CREDENTIAL_ID", id.clone()));
    }
    if let Some(value) = &credential.value {
        inputs.push(("KEYROT_CREDENTIAL_VALUE", value.secret().expose().to_string()));
        if let Some(access_key_id) = value.access_key_id() {
            inputs.push(("KEYROT_ACCESS_KEY_ID", access_key_id.to_string()));
        }
    }
    inputs
}

impl CredentialProvider for CommandProvider {
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
            let inputs = value
                .map(|v| vec![("KEYROT_NEW_VALUE", v.expose().to_string())])
                .unwrap_or_default();
            let output = self.run(Stage::Create, ctx, inputs).await?;
            if !output.success() {
                return Err(output.failure(Stage::Create));
            }
            self.parse_created(&output, value)
        })
    }

    fn verify<'a>(
        &'a self,
        ctx: &'a RotationContext,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            let output = self
                .run(Stage::Verify, ctx, credential_inputs(credential))
                .await?;
            match output.code {
                Some(0) => Ok(true),
                Some(VERIFY_REJECTED_EXIT) => Ok(false),
                _ => Err(ProviderError::InvalidResponse {
                    reason: output.describe(Stage::Verify),
                }),
            }
        })
    }

    fn switch_in<'a>(
        &'a self,
        ctx: &'a RotationContext,
        credential: &'a Credential,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let output = self
                .run(Stage::SwitchIn, ctx, credential_inputs(credential))
                .await?;
            if output.success() {
                Ok(())
            } else {
                Err(output.failure(Stage::SwitchIn))
            }
        })
    }

    fn revoke<'a>(
        &'a self,
        ctx: &'a RotationContext,
        old: &'a Credential,
        new: &'a Credential,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let mut inputs = Vec::with_capacity(3);
            if let Some(id) = &old.identifier {
                inputs.push(("KEYROT_OLD_CREDENTIAL_ID", id.clone()));
            }
            if let Some(id) = &new.identifier {
                inputs.push(("KEYROT_NEW_CREDENTIAL_ID", id.clone()));
            }
            if let Some(value) = &old.value {
                inputs.push(("KEYROT_OLD_CREDENTIAL_VALUE", value.secret().expose().to_string()));
            }
            let output = self.run(Stage::Revoke, ctx, inputs).await?;
            if output.success() {
                Ok(())
            } else {
                Err(output.failure(Stage::Revoke))
            }
        })
    }
}
