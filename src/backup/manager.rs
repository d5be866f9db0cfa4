//! Backup service
//!
//! Creates full and incremental backups, lists and deletes them, enforces
//! the tiered retention policy and hands restores to [`RestoreManager`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::BackupSettings;
use crate::crypto::{derive_key, encrypt_file, SecureString};
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::process::{CommandRunner, SystemCommandRunner};
use crate::storage::{read_json_required, write_json_atomic};

use super::archive::create_archive;
use super::components::{backup_configuration, backup_database, backup_files};
use super::fs_util::{path_size, remove_path};
use super::id::generate_backup_id;
use super::restore::RestoreManager;
use super::retention::plan_retention;
use super::types::{
    ArtifactKind, BackupComponents, BackupInfo, BackupMetadata, BackupOptions, BackupPhase,
    BackupResult, BackupType, CleanupReport, ComponentResult, RestoreResult,
};

/// Descriptor file inside every backup directory
pub const METADATA_FILE: &str = "metadata.json";
/// Suffix of the descriptor kept next to packed artifacts
pub const COMPANION_SUFFIX: &str = ".metadata.json";
/// Writability probe created and removed by preflight
const PROBE_FILE: &str = ".backup_test";

/// Produces, stores, retains and restores backups
pub struct BackupService {
    settings: BackupSettings,
    runner: Arc<dyn CommandRunner>,
}

impl BackupService {
    /// Create a service that runs external tools through `runner`
    pub fn new(settings: BackupSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self { settings, runner }
    }

    /// Create a service that runs the real dump and restore tools
    pub fn with_system_runner(settings: BackupSettings) -> Self {
        Self::new(settings, Arc::new(SystemCommandRunner))
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    pub fn backup_dir(&self) -> &Path {
        &self.settings.backup_dir
    }

    /// Check the backup root and encryption configuration before any work
    pub async fn preflight(&self) -> KeepsakeResult<()> {
        if self.settings.encryption.enabled && self.encryption_key().is_none() {
            return Err(KeepsakeError::Config(
                "Backup encryption is enabled but BACKUP_ENCRYPTION_KEY is not set".to_string(),
            ));
        }

        let backup_dir = self.settings.backup_dir.clone();
        tokio::task::spawn_blocking(move || -> KeepsakeResult<()> {
            fs::create_dir_all(&backup_dir).map_err(|e| {
                KeepsakeError::Config(format!(
                    "Cannot create backup directory {}: {}",
                    backup_dir.display(),
                    e
                ))
            })?;

            let probe = backup_dir.join(PROBE_FILE);
            fs::write(&probe, b"ok").map_err(|e| {
                KeepsakeError::Config(format!(
                    "Backup directory {} is not writable: {}",
                    backup_dir.display(),
                    e
                ))
            })?;
            if let Err(e) = fs::remove_file(&probe) {
                warn!(path = %probe.display(), error = %e, "Failed to remove writability probe");
            }
            Ok(())
        })
        .await?
    }

    fn encryption_key(&self) -> Option<&SecureString> {
        self.settings.encryption.key.as_ref().filter(|k| !k.is_empty())
    }

    /// Create a full backup of the database, files and configuration
    pub async fn create_full_backup(&self, options: BackupOptions) -> KeepsakeResult<BackupResult> {
        self.create_backup(BackupType::Full, None, options).await
    }

    /// Create an incremental backup linked to the last full backup
    ///
    /// Without a full backup to link to, this creates a full backup instead.
    pub async fn create_incremental_backup(
        &self,
        options: BackupOptions,
    ) -> KeepsakeResult<BackupResult> {
        match self.get_last_full_backup().await? {
            Some(base) => {
                self.create_backup(BackupType::Incremental, Some(base.id().to_string()), options)
                    .await
            }
            None => {
                info!("No full backup found, creating a full backup instead");
                self.create_full_backup(options).await
            }
        }
    }

    async fn create_backup(
        &self,
        backup_type: BackupType,
        base_backup_id: Option<String>,
        options: BackupOptions,
    ) -> KeepsakeResult<BackupResult> {
        self.preflight().await?;

        let timestamp = Utc::now();
        let backup_id = generate_backup_id(timestamp);
        let name = backup_type.artifact_name(&backup_id);

        info!(
            backup_id = %backup_id,
            backup_type = %backup_type,
            scheduled = options.scheduled,
            phase = %BackupPhase::Creating,
            "Creating backup"
        );

        let metadata = BackupMetadata {
            id: backup_id.clone(),
            backup_type,
            base_backup_id,
            timestamp,
            duration: 0,
            size: 0,
            components: BackupComponents::default(),
            scheduled: options.scheduled,
            cadence: options.cadence,
        };

        let result = match self.build(metadata).await {
            Ok(result) => result,
            Err(e) => {
                error!(backup_id = %backup_id, error = %e, "Backup failed");
                self.rollback(&name, &backup_id).await;
                return Err(e);
            }
        };

        info!(
            backup_id = %backup_id,
            path = %result.path.display(),
            phase = %BackupPhase::Stored,
            "Backup stored"
        );

        if let Err(e) = self.cleanup_excluding(Some(&backup_id)).await {
            warn!(error = %e, "Retention cleanup failed");
        }

        Ok(result)
    }

    /// Capture the payload, write metadata, then compress and encrypt
    async fn build(&self, mut metadata: BackupMetadata) -> KeepsakeResult<BackupResult> {
        let started = Instant::now();
        let backup_id = metadata.id.clone();
        let name = metadata.artifact_name();
        let work_dir = self.settings.backup_dir.join(&name);

        tokio::fs::create_dir(&work_dir).await.map_err(|e| {
            KeepsakeError::Io(format!("Failed to create {}: {}", work_dir.display(), e))
        })?;

        let database = backup_database(self.runner.as_ref(), &self.settings.database, &work_dir).await?;
        info!(backup_id = %backup_id, phase = %BackupPhase::DatabaseDone, "Database captured");

        let file_settings = self.settings.files.clone();
        let backup_dir = self.settings.backup_dir.clone();
        let dir = work_dir.clone();
        let files =
            tokio::task::spawn_blocking(move || backup_files(&file_settings, &backup_dir, &dir)).await??;
        info!(backup_id = %backup_id, phase = %BackupPhase::FilesDone, "Files captured");

        let configuration = match metadata.backup_type {
            BackupType::Full => {
                let file_settings = self.settings.files.clone();
                let dir = work_dir.clone();
                tokio::task::spawn_blocking(move || backup_configuration(&file_settings, &dir))
                    .await??
            }
            BackupType::Incremental => {
                ComponentResult::not_captured("configuration is only captured by full backups")
            }
        };
        info!(backup_id = %backup_id, phase = %BackupPhase::ConfigDone, "Configuration captured");

        let dir = work_dir.clone();
        metadata.size = tokio::task::spawn_blocking(move || path_size(&dir)).await??;
        metadata.duration = started.elapsed().as_millis() as u64;
        metadata.components = BackupComponents {
            database,
            files,
            configuration,
        };

        let descriptor = metadata.clone();
        let dir = work_dir.clone();
        tokio::task::spawn_blocking(move || write_json_atomic(dir.join(METADATA_FILE), &descriptor))
            .await??;
        info!(
            backup_id = %backup_id,
            size = metadata.size,
            phase = %BackupPhase::MetadataWritten,
            "Metadata written"
        );

        let path = self.package(&work_dir, &metadata).await?;

        Ok(BackupResult {
            backup_id,
            path,
            metadata,
        })
    }

    /// Replace the working directory with an archive, then an encrypted file
    async fn package(&self, work_dir: &Path, metadata: &BackupMetadata) -> KeepsakeResult<PathBuf> {
        let compression = &self.settings.compression;
        let encryption = &self.settings.encryption;

        if !compression.enabled && !encryption.enabled {
            return Ok(work_dir.to_path_buf());
        }

        let name = metadata.artifact_name();
        let backup_dir = self.settings.backup_dir.clone();

        // Encryption needs a single file, so it always gets at least a tar
        let archive_kind = if compression.enabled {
            ArtifactKind::TarGz
        } else {
            ArtifactKind::Tar
        };
        let archive_path = backup_dir.join(format!("{}{}", name, archive_kind.suffix()));
        let level = compression.enabled.then_some(compression.level);

        let source = work_dir.to_path_buf();
        let target = archive_path.clone();
        tokio::task::spawn_blocking(move || -> KeepsakeResult<()> {
            create_archive(&source, &target, level)?;
            remove_path(&source)
        })
        .await??;

        if compression.enabled {
            info!(backup_id = %metadata.id, phase = %BackupPhase::Compressed, "Backup compressed");
        } else {
            debug!(backup_id = %metadata.id, "Backup packed into tar for encryption");
        }

        let mut artifact = archive_path;

        if encryption.enabled {
            let passphrase = self.encryption_key().cloned().ok_or_else(|| {
                KeepsakeError::Config("BACKUP_ENCRYPTION_KEY is not set".to_string())
            })?;
            let encrypted_kind = if compression.enabled {
                ArtifactKind::EncryptedTarGz
            } else {
                ArtifactKind::EncryptedTar
            };
            let encrypted_path = backup_dir.join(format!("{}{}", name, encrypted_kind.suffix()));

            let source = artifact.clone();
            let target = encrypted_path.clone();
            tokio::task::spawn_blocking(move || -> KeepsakeResult<()> {
                let key = derive_key(passphrase.as_str())?;
                encrypt_file(&source, &target, &key)?;
                remove_path(&source)
            })
            .await??;

            info!(backup_id = %metadata.id, phase = %BackupPhase::Encrypted, "Backup encrypted");
            artifact = encrypted_path;
        }

        let companion = backup_dir.join(format!("{}{}", name, COMPANION_SUFFIX));
        let descriptor = metadata.clone();
        tokio::task::spawn_blocking(move || write_json_atomic(companion, &descriptor)).await??;

        Ok(artifact)
    }

    /// Best-effort removal of everything a failed run may have left behind
    async fn rollback(&self, name: &str, backup_id: &str) {
        let backup_dir = self.settings.backup_dir.clone();
        let artifact_name = name.to_string();

        let removed = tokio::task::spawn_blocking(move || remove_artifacts(&backup_dir, &artifact_name))
            .await
            .map_err(KeepsakeError::from)
            .and_then(|removed| removed);

        match removed {
            Ok(()) => warn!(
                backup_id = %backup_id,
                phase = %BackupPhase::FailedRolledBack,
                "Partial backup removed"
            ),
            Err(e) => error!(
                backup_id = %backup_id,
                phase = %BackupPhase::FailedOrphaned,
                error = %e,
                "Failed to remove partial backup"
            ),
        }
    }

    /// List all backups, newest first
    pub async fn list_backups(&self) -> KeepsakeResult<Vec<BackupInfo>> {
        let backup_dir = self.settings.backup_dir.clone();
        tokio::task::spawn_blocking(move || scan_backups(&backup_dir)).await?
    }

    /// The most recent full backup, if any
    pub async fn get_last_full_backup(&self) -> KeepsakeResult<Option<BackupInfo>> {
        Ok(self
            .list_backups()
            .await?
            .into_iter()
            .find(|b| b.backup_type() == BackupType::Full))
    }

    /// Find a backup by id, preferring a full backup over an incremental one
    pub async fn find_backup(&self, backup_id: &str) -> KeepsakeResult<BackupInfo> {
        let backups = self.list_backups().await?;

        [BackupType::Full, BackupType::Incremental]
            .iter()
            .find_map(|t| {
                backups
                    .iter()
                    .find(|b| b.id() == backup_id && b.backup_type() == *t)
                    .cloned()
            })
            .ok_or_else(|| KeepsakeError::backup_not_found(backup_id))
    }

    /// Delete a backup artifact and its companion metadata
    pub async fn delete_backup(&self, path: &Path) -> KeepsakeResult<()> {
        if path.parent() != Some(self.settings.backup_dir.as_path()) {
            return Err(KeepsakeError::Validation(format!(
                "{} is not inside the backup directory",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(KeepsakeError::backup_not_found(path.display().to_string()));
        }

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> KeepsakeResult<()> {
            remove_path(&path)?;
            if let Some(companion) = companion_for(&path) {
                if companion.exists() {
                    remove_path(&companion)?;
                }
            }
            Ok(())
        })
        .await??;

        Ok(())
    }

    /// Delete a backup by id
    pub async fn delete_backup_by_id(&self, backup_id: &str) -> KeepsakeResult<BackupInfo> {
        let backup = self.find_backup(backup_id).await?;
        self.delete_backup(&backup.path).await?;
        info!(backup_id = %backup_id, "Backup deleted");
        Ok(backup)
    }

    /// Delete backups beyond the retention count of their age tier
    pub async fn cleanup_old_backups(&self) -> KeepsakeResult<CleanupReport> {
        self.cleanup_excluding(None).await
    }

    /// Retention pass that never deletes `protected`
    ///
    /// The pass that follows a backup protects that backup, so a zero count
    /// for its tier removes it on the next pass instead of immediately.
    async fn cleanup_excluding(&self, protected: Option<&str>) -> KeepsakeResult<CleanupReport> {
        let backups = self.list_backups().await?;
        let plan = plan_retention(&backups, &self.settings.retention, Utc::now());

        let mut report = CleanupReport {
            kept: plan.keep.iter().map(|b| b.id().to_string()).collect(),
            ..Default::default()
        };

        for (backup, tier) in plan.delete {
            if Some(backup.id()) == protected {
                report.kept.push(backup.id().to_string());
                continue;
            }

            match self.delete_backup(&backup.path).await {
                Ok(()) => {
                    info!(backup_id = %backup.id(), tier = %tier, "Deleted backup beyond retention");
                    report.deleted.push(backup.id().to_string());
                }
                Err(e) => {
                    warn!(backup_id = %backup.id(), error = %e, "Failed to delete old backup");
                    report.failed.push(backup.id().to_string());
                }
            }
        }

        Ok(report)
    }

    /// Restore a backup by id
    pub async fn restore_backup(&self, backup_id: &str) -> KeepsakeResult<RestoreResult> {
        let backup = self.find_backup(backup_id).await?;
        let result = RestoreManager::new(&self.settings, self.runner.as_ref())
            .restore(&backup)
            .await?;
        info!(backup_id = %backup_id, duration_ms = result.duration_ms, "Restore completed");
        Ok(result)
    }
}

/// Companion metadata path for a packed artifact, `None` for directories
fn companion_for(artifact: &Path) -> Option<PathBuf> {
    let file_name = artifact.file_name()?.to_str()?;
    ArtifactKind::ALL
        .iter()
        .filter(|k| **k != ArtifactKind::Directory)
        .find_map(|k| file_name.strip_suffix(k.suffix()))
        .map(|base| artifact.with_file_name(format!("{}{}", base, COMPANION_SUFFIX)))
}

/// Remove every artifact named `name` in any form, reporting the first failure
fn remove_artifacts(backup_dir: &Path, name: &str) -> KeepsakeResult<()> {
    let mut candidates: Vec<PathBuf> = ArtifactKind::ALL
        .iter()
        .map(|k| backup_dir.join(format!("{}{}", name, k.suffix())))
        .collect();
    candidates.push(backup_dir.join(format!("{}{}", name, COMPANION_SUFFIX)));

    let mut first_error = None;
    for path in candidates.into_iter().filter(|p| p.exists()) {
        if let Err(e) = remove_path(&path) {
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Read every backup in `backup_dir`, skipping entries with unreadable metadata
fn scan_backups(backup_dir: &Path) -> KeepsakeResult<Vec<BackupInfo>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    let mut seen = HashSet::new();

    for entry in fs::read_dir(backup_dir).map_err(|e| {
        KeepsakeError::Io(format!("Failed to read backup directory: {}", e))
    })? {
        let entry = entry.map_err(|e| {
            KeepsakeError::Io(format!("Failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        let (name, metadata_path, located) = if path.is_dir() {
            (
                file_name.as_str(),
                path.join(METADATA_FILE),
                Some((path.clone(), ArtifactKind::Directory)),
            )
        } else if let Some(base) = file_name.strip_suffix(COMPANION_SUFFIX) {
            (base, path.clone(), locate_packed(backup_dir, base))
        } else {
            continue;
        };

        if BackupType::parse_artifact_name(name).is_none() {
            continue;
        }

        let Some((artifact, kind)) = located else {
            warn!(path = %path.display(), "Skipping metadata without a backup artifact");
            continue;
        };

        let metadata: BackupMetadata = match read_json_required(&metadata_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %metadata_path.display(), error = %e, "Skipping backup with unreadable metadata");
                continue;
            }
        };

        if metadata.artifact_name() != name {
            warn!(path = %metadata_path.display(), "Skipping backup whose metadata does not match its name");
            continue;
        }

        if !seen.insert((metadata.backup_type, metadata.id.clone())) {
            continue;
        }

        let artifact_size = path_size(&artifact).unwrap_or(0);
        backups.push(BackupInfo {
            metadata,
            path: artifact,
            kind,
            artifact_size,
        });
    }

    backups.sort_by(|a, b| {
        b.timestamp()
            .cmp(&a.timestamp())
            .then_with(|| b.id().cmp(a.id()))
    });

    Ok(backups)
}

/// Find the packed artifact for `base`, most processed form first
fn locate_packed(backup_dir: &Path, base: &str) -> Option<(PathBuf, ArtifactKind)> {
    ArtifactKind::ALL
        .iter()
        .filter(|k| **k != ArtifactKind::Directory)
        .map(|k| (backup_dir.join(format!("{}{}", base, k.suffix())), *k))
        .find(|(path, _)| path.is_file())
}
