//! CLI error types.

use std::fmt;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Invalid configuration.
    Config(String),
    /// Invalid argument.
    InvalidArgument(String),
    /// Command execution failed.
    Command(String),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Command(msg) => write!(f, "command error: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<keyrot_core::Error> for CliError {
    fn from(err: keyrot_core::Error) -> Self {
        match err {
            keyrot_core::Error::Validation { reason } => Self::InvalidArgument(reason),
            keyrot_core::Error::Config { reason } => Self::Config(reason),
            other => Self::Command(other.to_string()),
        }
    }
}
