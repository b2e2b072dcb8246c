//! Check command implementation.
//!
//! Loads and validates the configuration, then lists what it defines.

use std::io::Write;
use std::path::Path;

use keyrot_core::{KeyrotConfig, SwitchIn, ValueSource};

use crate::error::CliError;
use crate::output::{verifies, BackendInfo, ConfigSummary, EnvironmentInfo, OutputFormat};

/// Handler for the check command.
pub struct CheckCommand<'a> {
    config_path: &'a Path,
}

impl<'a> CheckCommand<'a> {
    /// Creates a new check command handler.
    #[must_use]
    pub const fn new(config_path: &'a Path) -> Self {
        Self { config_path }
    }

    /// Validates the configuration and prints a summary.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration cannot be loaded or is invalid.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let config = KeyrotConfig::from_file(self.config_path)?;
        format.write(out, &summarize(&config, self.config_path))
    }
}

fn summarize(config: &KeyrotConfig, path: &Path) -> ConfigSummary {
    let environments = config
        .environments
        .iter()
        .map(|(name, env)| EnvironmentInfo {
            name: name.clone(),
            vars: env.vars.keys().cloned().collect(),
        })
        .collect();

    let backends = config
        .backends
        .iter()
        .map(|(name, backend)| {
            let caps = backend.capabilities();
            let caller = backend.kind.value_source() == ValueSource::Caller;
            BackendInfo {
                name: name.clone(),
                kind: backend.kind.to_string(),
                value_source: if caller { "caller" } else { "backend" }.to_string(),
                verify: verifies(caps.verify),
                switch_in: caps.switch_in == SwitchIn::Required,
                min_length: caller.then(|| backend.generator().min_length()),
            }
        })
        .collect();

    ConfigSummary {
        path: path.display().to_string(),
        step_timeout_secs: config.engine.step_timeout_secs,
        environments,
        backends,
    }
}
