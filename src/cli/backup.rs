//! Backup CLI commands
//!
//! Handlers for `create-backup`, `list-backups`, `restore-backup`,
//! `delete-backup` and `cleanup-backups`.

use std::process::ExitCode;

use crate::backup::{BackupOptions, BackupService};
use crate::display::{
    format_backup_list, format_backup_result, format_cleanup_report, format_restore_result,
};
use crate::error::KeepsakeResult;

/// Usage line printed when `restore-backup` is called without an id
pub const RESTORE_USAGE: &str = "Usage: keepsake restore-backup <backup-id>";

/// Create a full backup, or an incremental one on request
pub async fn handle_create_backup(service: &BackupService, incremental: bool) -> KeepsakeResult<()> {
    println!(
        "Creating {} backup in {}...",
        if incremental { "incremental" } else { "full" },
        service.backup_dir().display()
    );

    let result = if incremental {
        service.create_incremental_backup(BackupOptions::manual()).await?
    } else {
        service.create_full_backup(BackupOptions::manual()).await?
    };

    println!("{}", format_backup_result(&result));
    Ok(())
}

pub async fn handle_list_backups(service: &BackupService) -> KeepsakeResult<()> {
    let backups = service.list_backups().await?;
    println!("{}", format_backup_list(&backups));
    if backups.is_empty() {
        println!("Create one with: keepsake create-backup");
    }
    Ok(())
}

/// Restore a backup by id
///
/// A missing id prints usage to stderr and fails without touching anything.
pub async fn handle_restore_backup(
    service: &BackupService,
    backup_id: Option<String>,
) -> KeepsakeResult<ExitCode> {
    let Some(backup_id) = backup_id.filter(|id| !id.trim().is_empty()) else {
        eprintln!("{}", RESTORE_USAGE);
        eprintln!("Run 'keepsake list-backups' to see available backup ids.");
        return Ok(ExitCode::FAILURE);
    };

    println!("Restoring backup {}...", backup_id);
    let result = service.restore_backup(backup_id.trim()).await?;
    println!("{}", format_restore_result(&result));
    Ok(ExitCode::SUCCESS)
}

pub async fn handle_delete_backup(service: &BackupService, backup_id: &str) -> KeepsakeResult<()> {
    let info = service.delete_backup_by_id(backup_id).await?;
    println!("✓ Deleted {} backup {}", info.backup_type(), info.id());
    println!("  Removed: {}", info.path.display());
    Ok(())
}

pub async fn handle_cleanup_backups(service: &BackupService) -> KeepsakeResult<ExitCode> {
    let report = service.cleanup_old_backups().await?;
    println!("{}", format_cleanup_report(&report));
    Ok(if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
