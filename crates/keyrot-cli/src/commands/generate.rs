//! Generate command implementation.

use std::io::Write;

use keyrot_core::{Encoding, GenerationSpec, SecretGenerator};

use crate::cli::{GenerateArgs, SecretKindArg};
use crate::error::CliError;
use crate::output::{GeneratedValue, OutputFormat};

/// Handler for the generate command.
#[derive(Debug, Default)]
pub struct GenerateCommand;

impl GenerateCommand {
    /// Creates a new generate command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates one value and prints it.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are out of range or output fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &GenerateArgs,
    ) -> Result<(), CliError> {
        let generator = match args.kind {
            SecretKindArg::Generic => SecretGenerator::generic(),
            SecretKindArg::Database => SecretGenerator::database_password(),
        };

        let encoding = Encoding::from(args.encoding);
        let mut spec = GenerationSpec::new(args.length, encoding);
        if args.special_chars {
            spec = spec.with_special_chars();
        }

        let value = generator.generate(&spec)?;
        let output = GeneratedValue {
            value: value.expose().to_string(),
            length: spec.length,
            encoding: encoding.to_string(),
        };

        format.write(out, &output)
    }
}
