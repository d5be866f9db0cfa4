use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use keepsake::backup::BackupService;
use keepsake::cli::{
    handle_cleanup_backups, handle_config_command, handle_create_backup, handle_delete_backup,
    handle_list_backups, handle_restore_backup, handle_schedule_command, handle_secrets_command,
    ScheduleCommands, SecretsCommands,
};
use keepsake::config::{KeepsakePaths, Settings};
use keepsake::logging::init_tracing;
use keepsake::secrets::SecretValidator;

#[derive(Parser)]
#[command(
    name = "keepsake",
    author = "Kaylee Beyene",
    version,
    about = "Backups, retention and secret hygiene for self-hosted web applications",
    long_about = "Keepsake creates full and incremental backups of an application's \
                  database, uploaded files and configuration, keeps them on a tiered \
                  retention schedule, and checks the application's secrets before \
                  they reach production."
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a full backup (or incremental with --incremental)
    CreateBackup {
        /// Link the backup to the last full backup
        #[arg(short, long)]
        incremental: bool,
    },

    /// List all backups, newest first
    #[command(alias = "ls")]
    ListBackups,

    /// Restore database and files from a backup
    RestoreBackup {
        /// Id of the backup to restore (see list-backups)
        backup_id: Option<String>,
    },

    /// Delete a backup and its metadata
    DeleteBackup {
        backup_id: String,
    },

    /// Apply the retention policy now
    CleanupBackups,

    /// Scheduled backups
    #[command(subcommand)]
    Schedule(ScheduleCommands),

    /// Secret validation and generation
    #[command(subcommand)]
    Secrets(SecretsCommands),

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let paths = KeepsakePaths::new()?;
    let settings = Settings::load(&paths).context("Invalid configuration")?;
    let service = Arc::new(BackupService::with_system_runner(settings.backup.clone()));

    let code = match cli.command {
        Commands::CreateBackup { incremental } => {
            handle_create_backup(&service, incremental).await?;
            ExitCode::SUCCESS
        }
        Commands::ListBackups => {
            handle_list_backups(&service).await?;
            ExitCode::SUCCESS
        }
        Commands::RestoreBackup { backup_id } => handle_restore_backup(&service, backup_id).await?,
        Commands::DeleteBackup { backup_id } => {
            handle_delete_backup(&service, &backup_id).await?;
            ExitCode::SUCCESS
        }
        Commands::CleanupBackups => handle_cleanup_backups(&service).await?,
        Commands::Schedule(cmd) => handle_schedule_command(service, &settings.schedule, cmd).await?,
        Commands::Secrets(cmd) => {
            let validator =
                SecretValidator::new(paths.clone(), settings.environment, &settings.secrets);
            handle_secrets_command(&paths, &validator, cmd)?
        }
        Commands::Config => {
            handle_config_command(&paths, &settings);
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
