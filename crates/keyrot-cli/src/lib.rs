//! # keyrot-cli
//!
//! Command-line wrapper around `keyrot-core`.
//!
//! Provides commands for:
//! - Rotating a credential through a configured backend
//! - Generating credential values
//! - Validating the configuration file
//!
//! Exit status follows the rotation outcome: 0 on success, 2 on partial
//! success (old credential not revoked), 1 on failure.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, GenerateArgs, RotateArgs};
pub use error::CliError;
pub use output::OutputFormat;
