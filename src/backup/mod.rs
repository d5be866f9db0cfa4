//! Backup system for Keepsake
//!
//! Produces point-in-time backups of the application database, uploaded
//! files, logs and configuration, with optional compression and
//! encryption, tiered retention and restore.
//!
//! # Architecture
//!
//! - `BackupService`: creates, lists, deletes and retains backups
//! - `RestoreManager`: unpacks a stored backup and restores it
//!
//! # Backup Layout
//!
//! Each backup starts as a `<type>-<id>/` directory under the backup root:
//! - `metadata.json`: id, type, timestamp, duration, size and component results
//! - `database/`: dump tool output
//! - `files/uploads/`, `files/logs/`: copied application directories
//! - `config/`: environment files and the project manifest
//!
//! With compression the directory becomes `<type>-<id>.tar.gz`, with
//! encryption the archive becomes `<type>-<id>.tar.gz.enc`. Packed backups
//! keep their descriptor next to them as `<type>-<id>.metadata.json`.
//!
//! # Retention Policy
//!
//! By default, the system keeps:
//! - 7 backups up to a week old
//! - 4 backups between 8 and 30 days old
//! - 12 backups older than that
//!
//! # Example
//!
//! ```rust,ignore
//! use keepsake::backup::{BackupOptions, BackupService};
//! use keepsake::config::{KeepsakePaths, Settings};
//!
//! let settings = Settings::load(&KeepsakePaths::new()?)?;
//! let service = BackupService::with_system_runner(settings.backup);
//!
//! let result = service.create_full_backup(BackupOptions::manual()).await?;
//! let restored = service.restore_backup(&result.backup_id).await?;
//! println!("{}", restored.summary());
//! ```

mod archive;
mod components;
mod fs_util;
mod id;
mod manager;
mod restore;
mod retention;
mod types;

pub use crate::config::RetentionPolicy;
pub use archive::{create_archive, extract_archive};
pub use id::generate_backup_id;
pub use manager::{BackupService, COMPANION_SUFFIX, METADATA_FILE};
pub use restore::RestoreManager;
pub use retention::{plan_retention, RetentionPlan, RetentionTier};
pub use types::{
    ArtifactKind, BackupComponents, BackupInfo, BackupMetadata, BackupOptions, BackupPhase,
    BackupResult, BackupType, CleanupReport, ComponentResult, RestoreResult,
};
