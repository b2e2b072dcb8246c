//! Rotate command implementation.
//!
//! Loads the configuration, builds the provider for the chosen backend and
//! runs one rotation through the engine.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use keyrot_core::generator::DEFAULT_LENGTH;
use keyrot_core::{
    BackendConfig, CommandProvider, Credential, CredentialKind, CredentialProvider,
    CredentialValue, GenerationSpec, KeyrotConfig, MemoryProvider, Outcome, RotationEngine,
    RotationReport, RotationRequest, Target, ValueSource,
};
use tracing::info;

use crate::cli::RotateArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the rotate command.
pub struct RotateCommand<'a> {
    config_path: &'a Path,
}

impl<'a> RotateCommand<'a> {
    /// Creates a new rotate command handler.
    #[must_use]
    pub const fn new(config_path: &'a Path) -> Self {
        Self { config_path }
    }

    /// Runs the rotation and prints its report.
    ///
    /// Operator warnings are also written to `warnings`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration or request is invalid, or output fails.
    /// Step failures are not errors; they are reported through the returned outcome.
    pub async fn execute<W: Write, E: Write>(
        &self,
        out: &mut W,
        warnings: &mut E,
        format: &OutputFormat,
        args: &RotateArgs,
    ) -> Result<Outcome, CliError> {
        let config = KeyrotConfig::from_file(self.config_path)?;
        let environment = config.environment(&args.environment)?;
        let backend = config.backend(&args.backend)?;
        let target = Target::new(args.target.as_str())?;

        let mut request = RotationRequest::new(environment, target.clone());
        if let Some(spec) = generation(args, backend)? {
            request = request.with_generation(spec);
        }
        let current = current_credential(
            backend.kind.credential_kind(),
            args.current_id.as_deref(),
            args.current_value.as_deref(),
        );
        if let Some(current) = &current {
            request = request.with_current(current.clone());
        }

        let provider: Arc<dyn CredentialProvider> = if args.dry_run {
            info!(backend = %args.backend, "dry run: using in-memory backend");
            let memory =
                MemoryProvider::new(backend.kind).with_capabilities(backend.capabilities());
            if let Some(current) = current.filter(|c| c.identifier.is_some()) {
                memory.seed(target.as_str(), current);
            }
            Arc::new(memory)
        } else {
            Arc::new(CommandProvider::from_config(
                backend,
                config.environment_vars(),
            ))
        };

        let engine = RotationEngine::new(provider)
            .with_config(config.engine_config()?)
            .with_generator(backend.generator());

        let result = engine.rotate(&request).await?;
        let report = RotationReport::new(&result, args.reveal);

        for warning in &report.warnings {
            writeln!(warnings, "warning: {warning}")?;
        }
        format.write(out, &report)?;

        Ok(result.outcome)
    }
}

/// Resolves generation parameters from the backend defaults and flags.
fn generation(args: &RotateArgs, backend: &BackendConfig) -> Result<Option<GenerationSpec>, CliError> {
    let overridden = args.length.is_some() || args.encoding.is_some() || args.special_chars;

    if backend.kind.value_source() == ValueSource::Backend {
        if overridden {
            return Err(CliError::InvalidArgument(format!(
                "{} mints its own values; --length, --encoding and --special-chars do not apply",
                backend.kind
            )));
        }
        return Ok(None);
    }

    let mut spec = backend.generation.unwrap_or_else(|| {
        GenerationSpec::new(
            DEFAULT_LENGTH.max(backend.generator().min_length()),
            keyrot_core::Encoding::default(),
        )
    });
    if let Some(length) = args.length {
        spec.length = length;
    }
    if let Some(encoding) = args.encoding {
        spec.encoding = encoding.into();
    }
    if args.special_chars {
        spec.include_special_chars = true;
    }
    Ok(Some(spec))
}

/// Describes the credential being replaced, if the caller named it.
fn current_credential(
    kind: CredentialKind,
    id: Option<&str>,
    value: Option<&str>,
) -> Option<Credential> {
    if id.is_none() && value.is_none() {
        return None;
    }

    let mut credential = Credential::active(kind);
    if let Some(id) = id {
        credential = credential.with_identifier(id);
    }
    if let Some(value) = value {
        credential = credential.with_value(match (kind, id) {
            (CredentialKind::AccessKeyPair, Some(id)) => CredentialValue::key_pair(id, value),
            _ => CredentialValue::single(value),
        });
    }
    Some(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands, EncodingArg, Format};
    use clap::Parser;
    use keyrot_core::Encoding;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
        [engine]
        step_timeout_secs = 5

        [environments.dev]

        [backends.app-db]
        kind = "database-password-store"
        min_length = 40

        [backends.app-db.hooks]
        create = ["true"]
        verify = ["true"]
        switch_in = ["true"]
        revoke = ["true"]

        [backends.ci-keys]
        kind = "iam-key-store"

        [backends.ci-keys.hooks]
        create = ["true"]
        verify = ["true"]
        switch_in = ["true"]
        revoke = ["true"]
    "#;

    fn config_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(CONFIG.as_bytes()).expect("write");
        file
    }

    fn rotate_args(extra: &[&str]) -> RotateArgs {
        let mut argv = vec!["keyrot", "rotate"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Rotate(args) => args,
            _ => panic!("expected rotate command"),
        }
    }

    #[test]
    fn generation_defaults_respect_raised_minimum() {
        let config = KeyrotConfig::from_toml(CONFIG).expect("valid");
        let args = rotate_args(&["-b", "app-db", "-e", "dev", "-t", "db"]);
        let spec = generation(&args, config.backend("app-db").expect("configured"))
            .expect("valid")
            .expect("caller-supplied");
        assert_eq!(spec.length, 40);
    }

    #[test]
    fn generation_flags_override_defaults() {
        let config = KeyrotConfig::from_toml(CONFIG).expect("valid");
        let mut args = rotate_args(&["-b", "app-db", "-e", "dev", "-t", "db", "-l", "64"]);
        args.encoding = Some(EncodingArg::Base64);
        let spec = generation(&args, config.backend("app-db").expect("configured"))
            .expect("valid")
            .expect("caller-supplied");
        assert_eq!(spec.length, 64);
        assert_eq!(spec.encoding, Encoding::Base64);
    }

    #[test]
    fn generation_flags_rejected_for_backend_minted_values() {
        let config = KeyrotConfig::from_toml(CONFIG).expect("valid");
        let args = rotate_args(&["-b", "ci-keys", "-e", "dev", "-t", "bot", "-l", "64"]);
        let result = generation(&args, config.backend("ci-keys").expect("configured"));
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn current_credential_builds_key_pair_for_iam() {
        let cred = current_credential(CredentialKind::AccessKeyPair, Some("AKIAOLD"), Some("s3cret"))
            .expect("described");
        let value = cred.value.expect("value");
        assert_eq!(value.access_key_id(), Some("AKIAOLD"));
        assert!(current_credential(CredentialKind::Password, None, None).is_none());
    }

    #[tokio::test]
    async fn dry_run_rotation_succeeds() {
        let file = config_file();
        let args = rotate_args(&[
            "-b",
            "ci-keys",
            "-e",
            "dev",
            "-t",
            "deploy-bot",
            "--current-id",
            "AKIAOLD",
            "--dry-run",
        ]);
        let mut out = Vec::new();
        let mut warnings = Vec::new();

        let outcome = RotateCommand::new(file.path())
            .execute(&mut out, &mut warnings, &OutputFormat::new(Format::Json), &args)
            .await
            .expect("rotation ran");

        assert_eq!(outcome, Outcome::Success);
        let report: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(report["outcome"], "success");
        assert_eq!(report["old_credential_id"], "AKIAOLD");
        assert_eq!(report["old_credential_status"], "revoked");
        assert_eq!(report["new_credential_value"], keyrot_core::report::MASK);
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn unknown_environment_is_an_error() {
        let file = config_file();
        let args = rotate_args(&["-b", "ci-keys", "-e", "prod", "-t", "bot", "--dry-run"]);
        let result = RotateCommand::new(file.path())
            .execute(&mut Vec::new(), &mut Vec::new(), &OutputFormat::default(), &args)
            .await;
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }
}
