//! Secret CLI commands

use std::process::ExitCode;

use clap::Subcommand;

use crate::audit::AuditLogger;
use crate::config::KeepsakePaths;
use crate::display::{format_generated_secrets, format_validation_report};
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::secrets::{GenerateOptions, ProductionGate, SecretValidator, SECRET_MIN_LENGTH};

/// Secret subcommands
#[derive(Subcommand)]
pub enum SecretsCommands {
    /// Check every secret against the policy (exit 1 on errors)
    Validate,

    /// Generate fresh secrets and write them into the .env file
    Generate {
        /// Length of each generated secret
        #[arg(short, long, default_value_t = SECRET_MIN_LENGTH)]
        length: usize,

        /// Use letters and digits only
        #[arg(long)]
        no_symbols: bool,

        /// Allow easily confused characters (0 O 1 l I)
        #[arg(long)]
        allow_similar: bool,
    },

    /// Fail when running in production with invalid secrets
    ProductionCheck,

    /// Show recent validation and generation runs
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

/// Handle a secrets command
pub fn handle_secrets_command(
    paths: &KeepsakePaths,
    validator: &SecretValidator,
    cmd: SecretsCommands,
) -> KeepsakeResult<ExitCode> {
    match cmd {
        SecretsCommands::Validate => {
            println!("Validating secrets ({} environment)...", validator.environment());
            let report = validator.validate_all_secrets()?;
            println!("{}", format_validation_report(&report));

            Ok(if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        SecretsCommands::Generate {
            length,
            no_symbols,
            allow_similar,
        } => {
            if length < SECRET_MIN_LENGTH {
                return Err(KeepsakeError::Validation(format!(
                    "Secret length must be at least {}, got {}",
                    SECRET_MIN_LENGTH, length
                )));
            }

            let options = GenerateOptions {
                length,
                include_symbols: !no_symbols,
                exclude_similar: !allow_similar,
            };
            let secrets = validator.generate_secrets(&options)?;
            validator.write_env_file(&secrets)?;

            println!("{}", format_generated_secrets(&secrets));
            println!("  Written to: {}", paths.env_file().display());
            println!("Restart the application to pick up the new values.");
            Ok(ExitCode::SUCCESS)
        }

        SecretsCommands::ProductionCheck => match validator.validate_production()? {
            ProductionGate::Skipped => {
                println!(
                    "Not a production environment ({}); skipping secret check.",
                    validator.environment()
                );
                Ok(ExitCode::SUCCESS)
            }
            gate => {
                if let Some(report) = gate.report() {
                    println!("{}", format_validation_report(report));
                }
                gate.enforce()?;
                Ok(ExitCode::SUCCESS)
            }
        },

        SecretsCommands::History { limit } => {
            let logger = AuditLogger::new(paths.secret_audit_log());
            let entries = logger.read_recent(limit)?;
            if entries.is_empty() {
                println!("No secret audit entries yet.");
                return Ok(ExitCode::SUCCESS);
            }
            for entry in entries.iter().rev() {
                println!("{}", entry.format_human_readable());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
