//! Scheduler CLI commands

use std::process::ExitCode;
use std::sync::Arc;

use clap::Subcommand;

use crate::backup::BackupService;
use crate::config::ScheduleSettings;
use crate::display::format_schedule_status;
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::scheduler::{run_scheduled_backup, BackupScheduler, Cadence};

/// Schedule subcommands
#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Run scheduled backups in the foreground until Ctrl-C
    Run {
        /// Run one backup for this cadence now and exit
        #[arg(long, value_name = "CADENCE")]
        once: Option<Cadence>,
    },

    /// Show configured schedules and their next fire times
    Status,
}

/// Handle a schedule command
pub async fn handle_schedule_command(
    service: Arc<BackupService>,
    settings: &ScheduleSettings,
    cmd: ScheduleCommands,
) -> KeepsakeResult<ExitCode> {
    match cmd {
        ScheduleCommands::Run { once: Some(cadence) } => {
            let ok = run_scheduled_backup(&service, cadence).await;
            if ok {
                println!("✓ {} backup completed", cadence);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("✗ {} backup failed; see the log for details", cadence);
                Ok(ExitCode::FAILURE)
            }
        }

        ScheduleCommands::Run { once: None } => {
            let scheduler = BackupScheduler::new(service, settings)?;

            if !scheduler.is_enabled() {
                println!("Backup scheduler is disabled (BACKUP_SCHEDULER_ENABLED=false).");
                return Ok(ExitCode::SUCCESS);
            }
            if scheduler.start() == 0 {
                eprintln!("✗ No backup schedules configured");
                return Ok(ExitCode::FAILURE);
            }

            println!("{}", format_schedule_status(true, &scheduler.get_status()));
            println!("Press Ctrl-C to stop.");

            tokio::signal::ctrl_c()
                .await
                .map_err(|e| KeepsakeError::Io(format!("Failed to listen for Ctrl-C: {}", e)))?;

            scheduler.stop();
            println!("✓ Scheduler stopped");
            Ok(ExitCode::SUCCESS)
        }

        ScheduleCommands::Status => {
            let scheduler = BackupScheduler::new(service, settings)?;
            println!(
                "{}",
                format_schedule_status(scheduler.is_enabled(), &scheduler.get_status())
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
