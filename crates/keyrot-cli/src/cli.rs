//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use keyrot_core::Encoding;

/// Keyrot - credential rotation without lockout.
#[derive(Parser, Debug, Clone)]
#[command(name = "keyrot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "KEYROT_CONFIG", default_value = "keyrot.toml", global = true)]
    pub config: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Increase log verbosity (-v info, -vv debug). Overrides `RUST_LOG`.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[derive(Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Rotate one credential.
    Rotate(RotateArgs),

    /// Generate a credential value without touching any backend.
    Generate(GenerateArgs),

    /// Validate the configuration and list environments and backends.
    Check,
}

/// Arguments for the rotate command.
#[derive(Parser, Debug, Clone)]
pub struct RotateArgs {
    /// Configured backend to drive.
    #[arg(short, long)]
    pub backend: String,

    /// Environment whose credential set authorizes the calls.
    #[arg(short, long)]
    pub environment: String,

    /// Backend-specific locator of the credential to rotate.
    #[arg(short, long)]
    pub target: String,

    /// Identifier of the credential being replaced.
    #[arg(long)]
    pub current_id: Option<String>,

    /// Value of the credential being replaced.
    #[arg(long, env = "KEYROT_CURRENT_VALUE", hide_env_values = true)]
    pub current_value: Option<String>,

    /// Length of the generated value.
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Encoding of the generated value.
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// Include punctuation in alphanumeric values.
    #[arg(long)]
    pub special_chars: bool,

    /// Print the new credential value instead of masking it.
    #[arg(long)]
    pub reveal: bool,

    /// Run against an in-memory backend instead of the configured hooks.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the generate command.
#[derive(Parser, Debug, Clone)]
pub struct GenerateArgs {
    /// Length of the value.
    #[arg(short, long, default_value_t = keyrot_core::generator::DEFAULT_LENGTH)]
    pub length: usize,

    /// Encoding of the value.
    #[arg(long, value_enum, default_value_t = EncodingArg::Alphanumeric)]
    pub encoding: EncodingArg,

    /// Include punctuation in alphanumeric values.
    #[arg(long)]
    pub special_chars: bool,

    /// Kind of secret, which sets the minimum length.
    #[arg(short, long, value_enum, default_value_t = SecretKindArg::Generic)]
    pub kind: SecretKindArg,
}

/// Value encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    /// Letters and digits.
    Alphanumeric,
    /// Standard base64.
    Base64,
    /// Lowercase hexadecimal.
    Hex,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Alphanumeric => Self::Alphanumeric,
            EncodingArg::Base64 => Self::Base64,
            EncodingArg::Hex => Self::Hex,
        }
    }
}

/// Secret kinds for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecretKindArg {
    /// Secret-store value (minimum 8).
    Generic,
    /// Database password (minimum 12).
    Database,
}
