//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use keyrot_core::{RotationReport, VerifySupport};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for RotationReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Rotation {}", self.rotation_id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Outcome:          {}", self.outcome)?;
        writeln!(writer, "Environment:      {}", self.environment)?;
        writeln!(writer, "Target:           {}", self.target)?;
        writeln!(writer, "Backend:          {}", self.backend)?;
        writeln!(writer, "Verification:     {}", self.verification)?;
        writeln!(writer, "Duration:         {} ms", self.duration_ms)?;
        writeln!(writer)?;
        writeln!(writer, "New credential")?;
        writeln!(writer, "  ID:             {}", or_dash(self.new_credential_id.as_deref()))?;
        if let Some(access_key_id) = &self.new_access_key_id {
            writeln!(writer, "  Access key ID:  {access_key_id}")?;
        }
        writeln!(writer, "  Value:          {}", or_dash(self.new_credential_value.as_deref()))?;
        if let Some(stray) = &self.stray_credential_id {
            writeln!(writer, "  Unused:         {stray}")?;
        }
        writeln!(writer)?;
        writeln!(writer, "Old credential")?;
        writeln!(writer, "  ID:             {}", or_dash(self.old_credential_id.as_deref()))?;
        writeln!(writer, "  Status:         {}", self.old_credential_status)?;

        let trace: Vec<String> = self.trace.iter().map(ToString::to_string).collect();
        writeln!(writer)?;
        writeln!(writer, "Trace:            {}", trace.join(" → "))?;

        if let Some(error) = &self.error {
            writeln!(writer, "Error:            {error}")?;
        }
        if let Some(guidance) = &self.guidance {
            writeln!(writer)?;
            writeln!(writer, "Next steps")?;
            writeln!(writer, "  {guidance}")?;
        }
        Ok(())
    }
}

/// A generated value.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedValue {
    /// The value.
    pub value: String,
    /// Requested length.
    pub length: usize,
    /// Encoding used.
    pub encoding: String,
}

impl TableDisplay for GeneratedValue {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.value)?;
        Ok(())
    }
}

/// A configured environment.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    /// Environment name.
    pub name: String,
    /// Names of the variables passed to hooks; values are not shown.
    pub vars: Vec<String>,
}

/// A configured backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    /// Backend name.
    pub name: String,
    /// Backend variant.
    pub kind: String,
    /// Who produces new values.
    pub value_source: String,
    /// Whether new credentials are verified.
    pub verify: bool,
    /// Whether a separate switch-in step runs.
    pub switch_in: bool,
    /// Minimum generated length, for caller-supplied backends.
    pub min_length: Option<usize>,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Path that was loaded.
    pub path: String,
    /// Per-step timeout.
    pub step_timeout_secs: u64,
    /// Configured environments.
    pub environments: Vec<EnvironmentInfo>,
    /// Configured backends.
    pub backends: Vec<BackendInfo>,
}

impl TableDisplay for ConfigSummary {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Configuration OK: {}", self.path)?;
        writeln!(writer, "Step timeout:     {}s", self.step_timeout_secs)?;
        writeln!(writer)?;

        writeln!(writer, "{:<20}  {}", "ENVIRONMENT", "VARS")?;
        writeln!(writer, "{}", "─".repeat(48))?;
        for env in &self.environments {
            writeln!(writer, "{:<20}  {}", env.name, env.vars.join(", "))?;
        }
        writeln!(writer)?;

        if self.backends.is_empty() {
            writeln!(writer, "No backends configured")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<20}  {:<24}  {:<8}  {:<8}  {:<8}  {:>6}",
            "BACKEND", "KIND", "VALUES", "VERIFY", "SWITCH", "MIN"
        )?;
        writeln!(writer, "{}", "─".repeat(84))?;
        for backend in &self.backends {
            writeln!(
                writer,
                "{:<20}  {:<24}  {:<8}  {:<8}  {:<8}  {:>6}",
                truncate(&backend.name, 20),
                backend.kind,
                backend.value_source,
                yes_no(backend.verify),
                yes_no(backend.switch_in),
                backend
                    .min_length
                    .map_or_else(|| "-".to_string(), |n| n.to_string())
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} backend(s)", self.backends.len())?;
        Ok(())
    }
}

/// Renders verification support as a yes/no flag.
#[must_use]
pub const fn verifies(support: VerifySupport) -> bool {
    matches!(support, VerifySupport::Supported)
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Truncate a string to a maximum length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
