//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`rotate`] - Run one credential rotation
//! - [`generate`] - Generate a credential value
//! - [`check`] - Validate the configuration

pub mod check;
pub mod generate;
pub mod rotate;

pub use check::CheckCommand;
pub use generate::GenerateCommand;
pub use rotate::RotateCommand;
