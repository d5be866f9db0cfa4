//! Backup restoration
//!
//! Packed artifacts are unpacked into a `.restore-<id>` staging directory
//! under the backup root, then the database is reloaded with the restore
//! tool and application files are copied back. Nothing is rolled back if a
//! later stage fails.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::BackupSettings;
use crate::crypto::{decrypt_file, derive_key};
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::process::CommandRunner;

use super::archive::extract_archive;
use super::components::{restore_database, restore_files};
use super::fs_util::remove_path;
use super::types::{ArtifactKind, BackupInfo, RestoreResult};

/// Restores a listed backup into the live system
pub struct RestoreManager<'a> {
    settings: &'a BackupSettings,
    runner: &'a dyn CommandRunner,
}

impl<'a> RestoreManager<'a> {
    pub fn new(settings: &'a BackupSettings, runner: &'a dyn CommandRunner) -> Self {
        Self { settings, runner }
    }

    /// Staging directory used while unpacking `backup_id`
    pub fn staging_dir(&self, backup_id: &str) -> PathBuf {
        self.settings.backup_dir.join(format!(".restore-{}", backup_id))
    }

    /// Restore a backup
    ///
    /// This overwrites the configured database and copies files over the
    /// live upload and log directories.
    pub async fn restore(&self, backup: &BackupInfo) -> KeepsakeResult<RestoreResult> {
        let started = Instant::now();
        let staging = self.staging_dir(backup.id());

        info!(backup_id = %backup.id(), kind = %backup.kind, "Restoring backup");

        let result = self.restore_from(backup, &staging, started).await;

        if backup.kind != ArtifactKind::Directory {
            let staging_path = staging.clone();
            let cleanup = tokio::task::spawn_blocking(move || {
                if staging_path.exists() {
                    remove_path(&staging_path)
                } else {
                    Ok(())
                }
            })
            .await
            .map_err(KeepsakeError::from)
            .and_then(|removed| removed);

            if let Err(e) = cleanup {
                warn!(path = %staging.display(), error = %e, "Failed to clean up restore staging");
            }
        }

        result
    }

    async fn restore_from(
        &self,
        backup: &BackupInfo,
        staging: &Path,
        started: Instant,
    ) -> KeepsakeResult<RestoreResult> {
        let payload = self.unpack(backup, staging).await?;

        let database = restore_database(self.runner, &self.settings.database, &payload).await?;
        info!(backup_id = %backup.id(), "Database restored");

        let file_settings = self.settings.files.clone();
        let payload_dir = payload.clone();
        let files = tokio::task::spawn_blocking(move || restore_files(&file_settings, &payload_dir)).await??;
        info!(backup_id = %backup.id(), "Files restored");

        Ok(RestoreResult {
            backup_id: backup.id().to_string(),
            backup_type: backup.backup_type(),
            backup_timestamp: backup.timestamp(),
            duration_ms: started.elapsed().as_millis() as u64,
            database,
            files,
        })
    }

    /// Produce a directory holding the backup payload
    async fn unpack(&self, backup: &BackupInfo, staging: &Path) -> KeepsakeResult<PathBuf> {
        if backup.kind == ArtifactKind::Directory {
            return Ok(backup.path.clone());
        }

        let key = if backup.kind.is_encrypted() {
            Some(self.settings.encryption.key.clone().ok_or_else(|| {
                KeepsakeError::Config(
                    "Backup is encrypted but BACKUP_ENCRYPTION_KEY is not set".to_string(),
                )
            })?)
        } else {
            None
        };

        let name = backup.metadata.artifact_name();
        let source = backup.path.clone();
        let staging = staging.to_path_buf();
        let kind = backup.kind;

        tokio::task::spawn_blocking(move || -> KeepsakeResult<PathBuf> {
            if staging.exists() {
                remove_path(&staging)?;
            }
            std::fs::create_dir_all(&staging)?;

            let mut archive = source;
            if let Some(passphrase) = key {
                let decrypted = staging.join(format!("{}{}", name, kind.decrypted().suffix()));
                decrypt_file(&archive, &decrypted, &derive_key(passphrase.as_str())?)?;
                archive = decrypted;
            }

            extract_archive(&archive, &staging, kind.is_compressed())?;

            let payload = staging.join(&name);
            if !payload.is_dir() {
                return Err(KeepsakeError::Archive(format!(
                    "Archive does not contain a {} directory",
                    name
                )));
            }
            Ok(payload)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{BackupOptions, BackupService};
    use crate::process::testing::FakeRunner;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn settings(temp: &TempDir, compress: bool, key: Option<&str>) -> BackupSettings {
        let mut settings = BackupSettings::rooted_at(temp.path());
        settings.compression.enabled = compress;
        settings.encryption.enabled = key.is_some();
        settings.encryption.key = key.map(Into::into);
        fs::create_dir_all(&settings.files.uploads_dir).unwrap();
        fs::write(settings.files.uploads_dir.join("photo.jpg"), b"jpeg bytes").unwrap();
        settings
    }

    async fn backup_then_restore(settings: BackupSettings) -> (RestoreResult, Arc<FakeRunner>, BackupSettings) {
        let runner = Arc::new(FakeRunner::default());
        let service = BackupService::new(settings.clone(), runner.clone());
        let created = service.create_full_backup(BackupOptions::manual()).await.unwrap();

        // Simulate data loss before restoring
        fs::remove_dir_all(&settings.files.uploads_dir).unwrap();

        let restored = service.restore_backup(&created.backup_id).await.unwrap();
        (restored, runner, settings)
    }

    #[tokio::test]
    async fn test_restore_encrypted_compressed_backup() {
        let temp = TempDir::new().unwrap();
        let (result, runner, settings) =
            backup_then_restore(settings(&temp, true, Some("restore passphrase"))).await;

        assert!(result.database.success);
        assert_eq!(
            fs::read(settings.files.uploads_dir.join("photo.jpg")).unwrap(),
            b"jpeg bytes"
        );
        assert_eq!(result.summary(), "Restored: database, files");

        let call = runner.last_call("mongorestore").unwrap();
        assert!(call.args.contains(&"--drop".to_string()));

        let manager = RestoreManager::new(&settings, runner.as_ref());
        assert!(!manager.staging_dir(&result.backup_id).exists());
    }

    #[tokio::test]
    async fn test_restore_plain_directory_backup() {
        let temp = TempDir::new().unwrap();
        let (result, _, settings) = backup_then_restore(settings(&temp, false, None)).await;

        assert!(settings.files.uploads_dir.join("photo.jpg").exists());
        assert!(result.files.skipped.iter().any(|s| s.starts_with("logs")));
    }

    #[tokio::test]
    async fn test_restore_encrypted_without_key_fails() {
        let temp = TempDir::new().unwrap();
        let mut settings = settings(&temp, true, Some("k"));
        let runner = Arc::new(FakeRunner::default());
        let created = BackupService::new(settings.clone(), runner.clone())
            .create_full_backup(BackupOptions::manual())
            .await
            .unwrap();

        settings.encryption.enabled = false;
        settings.encryption.key = None;
        let err = BackupService::new(settings, runner)
            .restore_backup(&created.backup_id)
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_restore_database_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp, true, None);
        let created = BackupService::new(settings.clone(), Arc::new(FakeRunner::default()))
            .create_full_backup(BackupOptions::manual())
            .await
            .unwrap();

        let err = BackupService::new(settings, Arc::new(FakeRunner::failing("mongorestore")))
            .restore_backup(&created.backup_id)
            .await
            .unwrap_err();
        assert!(matches!(err, KeepsakeError::Database(_)));
    }
}
