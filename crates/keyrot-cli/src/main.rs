//! Keyrot CLI binary entrypoint.
//!
//! This is the main entry point for the `keyrot` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use keyrot_core::result::{EXIT_FAILED, EXIT_SUCCESS};
use tracing_subscriber::EnvFilter;

use keyrot_cli::cli::{Cli, Commands};
use keyrot_cli::commands::{CheckCommand, GenerateCommand, RotateCommand};
use keyrot_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::from(EXIT_FAILED);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<u8, keyrot_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Rotate(args) => {
            let cmd = RotateCommand::new(&cli.config);
            let mut stderr = io::stderr().lock();
            let outcome = cmd.execute(&mut stdout, &mut stderr, &format, &args).await?;
            return Ok(outcome.exit_code());
        }
        Commands::Generate(args) => {
            let cmd = GenerateCommand::new();
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Check => {
            let cmd = CheckCommand::new(&cli.config);
            cmd.execute(&mut stdout, &format)?;
        }
    }

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyrot_cli::cli::Format;

    #[test]
    fn cli_parses_check() {
        let cli = Cli::parse_from(["keyrot", "check"]);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn cli_respects_format_flag() {
        let cli = Cli::parse_from(["keyrot", "--format", "json", "check"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[tokio::test]
    async fn run_check_without_config_fails() {
        let cli = Cli::parse_from(["keyrot", "-c", "/nonexistent/keyrot.toml", "check"]);
        assert!(run(cli).await.is_err());
    }

    #[tokio::test]
    async fn run_generate_succeeds() {
        let cli = Cli::parse_from(["keyrot", "generate", "--length", "16"]);
        assert_eq!(run(cli).await.expect("generated"), EXIT_SUCCESS);
    }
}
