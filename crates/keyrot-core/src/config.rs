//! Engine and deployment configuration.
//!
//! [`EngineConfig`] tunes the engine itself. [`KeyrotConfig`] is the TOML
//! document describing the closed environment set and the configured backends:
//!
//! ```toml
//! [engine]
//! step_timeout_secs = 30
//!
//! [environments.dev]
//! [environments.prod.vars]
//! AWS_PROFILE = "prod-rotation"
//!
//! [backends.ci-keys]
//! kind = "iam-key-store"
//!
//! [backends.ci-keys.hooks]
//! create = ["./hooks/iam.sh", "create"]
//! verify = ["./hooks/iam.sh", "verify"]
//! switch_in = ["./hooks/iam.sh", "publish"]
//! revoke = ["./hooks/iam.sh", "revoke"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generator::{GenerationSpec, SecretGenerator};
use crate::provider::{BackendKind, Capabilities, SwitchIn, ValueSource, VerifySupport};
use crate::types::Environment;

/// Default per-step timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    step_timeout: Duration,
}

impl EngineConfig {
    /// Creates a config with the given per-step timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero.
    pub fn new(step_timeout: Duration) -> Result<Self> {
        if step_timeout.is_zero() {
            return Err(Error::config("step timeout must be greater than 0"));
        }
        Ok(Self { step_timeout })
    }

    /// Timeout applied to each provider call.
    #[must_use]
    pub const fn step_timeout(&self) -> Duration {
        self.step_timeout
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Per-step timeout in seconds.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

const fn default_step_timeout_secs() -> u64 {
    DEFAULT_STEP_TIMEOUT.as_secs()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

/// `[environments.<name>]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Variables handed to the backend driver for calls in this environment.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

/// `[backends.<name>.hooks]` table: argv for each primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSet {
    /// Mints the new credential.
    #[serde(default)]
    pub create: Option<Vec<String>>,
    /// Proves the new credential works.
    #[serde(default)]
    pub verify: Option<Vec<String>>,
    /// Publishes the new credential.
    #[serde(default)]
    pub switch_in: Option<Vec<String>>,
    /// Destroys the old credential.
    #[serde(default)]
    pub revoke: Option<Vec<String>>,
}

impl HookSet {
    fn entries(&self) -> [(&'static str, Option<&Vec<String>>); 4] {
        [
            ("create", self.create.as_ref()),
            ("verify", self.verify.as_ref()),
            ("switch_in", self.switch_in.as_ref()),
            ("revoke", self.revoke.as_ref()),
        ]
    }
}

/// `[backends.<name>]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend variant.
    pub kind: BackendKind,
    /// Explicit verification override.
    #[serde(default)]
    pub verify: Option<bool>,
    /// Explicit switch-in override.
    #[serde(default)]
    pub switch_in: Option<bool>,
    /// Raised minimum generated length.
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Default generation parameters.
    #[serde(default)]
    pub generation: Option<GenerationSpec>,
    /// Hook programs.
    #[serde(default)]
    pub hooks: HookSet,
}

impl BackendConfig {
    /// Capabilities after applying explicit overrides.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = self.kind.default_capabilities();
        if let Some(verify) = self.verify {
            caps = caps.with_verify(if verify {
                VerifySupport::Supported
            } else {
                VerifySupport::Unsupported
            });
        }
        if let Some(switch_in) = self.switch_in {
            caps = caps.with_switch_in(if switch_in {
                SwitchIn::Required
            } else {
                SwitchIn::NotApplicable
            });
        }
        caps
    }

    /// Generator enforcing the effective minimum length.
    #[must_use]
    pub fn generator(&self) -> SecretGenerator {
        match self.min_length {
            Some(min) => SecretGenerator::new(min),
            None => self.kind.generator(),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        for (hook, argv) in self.hooks.entries() {
            if let Some(argv) = argv {
                if argv.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(Error::config(format!(
                        "backends.{name}.hooks.{hook} must name a program"
                    )));
                }
            }
        }

        if self.hooks.create.is_none() {
            return Err(Error::config(format!(
                "backends.{name}.hooks.create is required"
            )));
        }
        if self.hooks.revoke.is_none() {
            return Err(Error::config(format!(
                "backends.{name}.hooks.revoke is required"
            )));
        }

        let caps = self.capabilities();
        if caps.verify == VerifySupport::Supported && self.hooks.verify.is_none() {
            return Err(Error::config(format!(
                "backends.{name} declares verification but has no verify hook; set verify = false to skip it explicitly"
            )));
        }
        if caps.switch_in == SwitchIn::Required && self.hooks.switch_in.is_none() {
            return Err(Error::config(format!(
                "backends.{name} requires switch-in but has no switch_in hook; set switch_in = false if create already activates the credential"
            )));
        }

        if let Some(min) = self.min_length {
            let floor = self.kind.min_secret_length().unwrap_or(1);
            if min < floor {
                return Err(Error::config(format!(
                    "backends.{name}.min_length {min} is below the {} minimum of {floor}",
                    self.kind
                )));
            }
        }

        if let Some(spec) = &self.generation {
            if self.kind.value_source() == ValueSource::Backend {
                return Err(Error::config(format!(
                    "backends.{name}.generation is set but {} generates its own values",
                    self.kind
                )));
            }
            spec.validate(self.generator().min_length())
                .map_err(|e| Error::config(format!("backends.{name}.generation: {e}")))?;
        }

        Ok(())
    }
}

/// The deployment configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyrotConfig {
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineSection,
    /// The closed environment set.
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
    /// Configured backends by name.
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

impl KeyrotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found.
    pub fn validate(&self) -> Result<()> {
        if self.engine.step_timeout_secs == 0 {
            return Err(Error::config(
                "engine.step_timeout_secs must be greater than 0",
            ));
        }

        if self.environments.is_empty() {
            return Err(Error::config("at least one environment must be defined"));
        }

        for name in self.environments.keys() {
            Environment::new(name.as_str())
                .map_err(|e| Error::config(format!("environments.{name}: {e}")))?;
        }

        for (name, backend) in &self.backends {
            backend.validate(name)?;
        }

        Ok(())
    }

    /// Engine tuning derived from the `[engine]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::new(Duration::from_secs(self.engine.step_timeout_secs))
    }

    /// Resolves an environment name against the closed set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for names outside the set.
    pub fn environment(&self, name: &str) -> Result<Environment> {
        if !self.environments.contains_key(name) {
            let known: Vec<&str> = self.environments.keys().map(String::as_str).collect();
            return Err(Error::validation(format!(
                "unknown environment '{name}'; configured: {}",
                known.join(", ")
            )));
        }
        Environment::new(name)
    }

    /// Looks up a backend by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if no backend has that name.
    pub fn backend(&self, name: &str) -> Result<&BackendConfig> {
        self.backends
            .get(name)
            .ok_or_else(|| Error::validation(format!("unknown backend '{name}'")))
    }

    /// Variables configured for an environment.
    #[must_use]
    pub fn vars(&self, environment: &Environment) -> BTreeMap<String, String> {
        self.environments
            .get(environment.as_str())
            .map(|env| env.vars.clone())
            .unwrap_or_default()
    }

    /// Per-environment variables for every environment.
    #[must_use]
    pub fn environment_vars(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.environments
            .iter()
            .map(|(name, env)| (name.clone(), env.vars.clone()))
            .collect()
    }
}
