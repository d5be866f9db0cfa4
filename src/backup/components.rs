//! The three sub-backups: database, application files and configuration
//!
//! Database work goes through a [`CommandRunner`]; file and configuration
//! copies are synchronous and meant for the blocking pool.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::{DatabaseSettings, FileSettings};
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::process::{CommandRunner, CommandSpec};

use super::fs_util::copy_dir_recursive;
use super::types::ComponentResult;

/// Subdirectory holding the dump tool's output
pub const DATABASE_DIR: &str = "database";
/// Subdirectory holding copied application files
pub const FILES_DIR: &str = "files";
/// Subdirectory holding copied configuration files
pub const CONFIG_DIR: &str = "config";

/// Connection flags shared by the dump and restore tools
fn with_connection(mut spec: CommandSpec, db: &DatabaseSettings, include_db: bool) -> CommandSpec {
    if let Some(uri) = &db.uri {
        return spec.secret_arg(format!("--uri={}", uri));
    }

    spec = spec
        .arg(format!("--host={}", db.host))
        .arg(format!("--port={}", db.port));
    if include_db {
        spec = spec.arg(format!("--db={}", db.name));
    }
    if let Some(user) = &db.username {
        spec = spec.arg(format!("--username={}", user));
    }
    if let Some(password) = &db.password {
        spec = spec
            .secret_arg(format!("--password={}", password.as_str()))
            .arg(format!("--authenticationDatabase={}", db.auth_source));
    }
    spec
}

/// Dump invocation writing into `<backup_path>/database`
pub fn dump_command(db: &DatabaseSettings, backup_path: &Path) -> CommandSpec {
    let out = backup_path.join(DATABASE_DIR);
    with_connection(CommandSpec::new(&db.dump_command), db, true)
        .arg(format!("--out={}", out.display()))
}

/// Drop-and-load restore invocation reading `<payload>/database`
pub fn restore_command(db: &DatabaseSettings, payload: &Path) -> CommandSpec {
    let dump = payload.join(DATABASE_DIR);
    with_connection(CommandSpec::new(&db.restore_command), db, false)
        .arg("--drop")
        .arg(dump.display().to_string())
}

/// Dump the database into the backup directory
///
/// Any failure is fatal to the enclosing backup.
pub async fn backup_database(
    runner: &dyn CommandRunner,
    db: &DatabaseSettings,
    backup_path: &Path,
) -> KeepsakeResult<ComponentResult> {
    let spec = dump_command(db, backup_path);
    debug!(command = %spec.redacted(), "Dumping database");

    let output = runner
        .run(&spec)
        .await
        .and_then(|output| output.into_result(&spec.program))
        .map_err(|e| KeepsakeError::Database(format!("Database backup failed: {}", e)))?;

    Ok(ComponentResult::succeeded(output.combined()))
}

/// Load a dump back into the configured database, dropping existing collections
pub async fn restore_database(
    runner: &dyn CommandRunner,
    db: &DatabaseSettings,
    payload: &Path,
) -> KeepsakeResult<ComponentResult> {
    if !payload.join(DATABASE_DIR).is_dir() {
        return Err(KeepsakeError::Database(
            "Backup does not contain a database dump".to_string(),
        ));
    }

    let spec = restore_command(db, payload);
    debug!(command = %spec.redacted(), "Restoring database");

    let output = runner
        .run(&spec)
        .await
        .and_then(|output| output.into_result(&spec.program))
        .map_err(|e| KeepsakeError::Database(format!("Database restore failed: {}", e)))?;

    Ok(ComponentResult::succeeded(output.combined()))
}

/// Named application directories, as (label, live path)
fn file_sources(files: &FileSettings) -> [(&'static str, &Path); 2] {
    [("uploads", files.uploads_dir.as_path()), ("logs", files.logs_dir.as_path())]
}

/// Copy the uploads and logs directories into `<backup_path>/files`
///
/// `backup_dir` is never copied, even when it sits inside one of them.
pub fn backup_files(
    files: &FileSettings,
    backup_dir: &Path,
    backup_path: &Path,
) -> KeepsakeResult<ComponentResult> {
    let files_root = backup_path.join(FILES_DIR);
    fs::create_dir_all(&files_root)?;

    let mut copied = Vec::new();
    let mut skipped = Vec::new();

    for (label, source) in file_sources(files) {
        if !source.is_dir() {
            debug!(directory = %source.display(), "Skipping missing {} directory", label);
            skipped.push(format!("{} directory not found: {}", label, source.display()));
            continue;
        }
        if backup_dir.starts_with(source) {
            debug!(directory = %source.display(), "Leaving the backup directory out of {}", label);
        }
        let count = copy_dir_recursive(source, &files_root.join(label), Some(backup_dir))?;
        copied.push(format!("{} files from {}", count, label));
    }

    let mut result = ComponentResult::succeeded(if copied.is_empty() {
        String::new()
    } else {
        format!("Copied {}", copied.join(", "))
    });
    result.skipped = skipped;
    Ok(result)
}

/// Copy the configured environment files and manifest into `<backup_path>/config`
pub fn backup_configuration(files: &FileSettings, backup_path: &Path) -> KeepsakeResult<ComponentResult> {
    let config_root = backup_path.join(CONFIG_DIR);
    fs::create_dir_all(&config_root)?;

    let mut copied = Vec::new();
    let mut skipped = Vec::new();

    for name in &files.config_files {
        let source = files.config_dir.join(name);
        if !source.is_file() {
            skipped.push(name.clone());
            continue;
        }
        let Some(file_name) = Path::new(name).file_name() else {
            skipped.push(name.clone());
            continue;
        };
        fs::copy(&source, config_root.join(file_name)).map_err(|e| {
            KeepsakeError::Io(format!("Failed to copy {}: {}", source.display(), e))
        })?;
        copied.push(name.clone());
    }

    let mut result = ComponentResult::succeeded(if copied.is_empty() {
        String::new()
    } else {
        format!("Copied {}", copied.join(", "))
    });
    result.skipped = skipped;
    Ok(result)
}

/// Copy `files/uploads` and `files/logs` from a payload back into the live directories
pub fn restore_files(files: &FileSettings, payload: &Path) -> KeepsakeResult<ComponentResult> {
    let files_root = payload.join(FILES_DIR);

    let mut restored = Vec::new();
    let mut skipped = Vec::new();

    for (label, target) in file_sources(files) {
        let source = files_root.join(label);
        if !source.is_dir() {
            skipped.push(format!("{} not present in backup", label));
            continue;
        }
        let count = copy_dir_recursive(&source, target, None)?;
        if count == 0 {
            warn!(directory = %target.display(), "Backup held an empty {} directory", label);
        }
        restored.push(format!("{} files into {}", count, target.display()));
    }

    let mut result = ComponentResult::succeeded(if restored.is_empty() {
        String::new()
    } else {
        format!("Restored {}", restored.join(", "))
    });
    result.skipped = skipped;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupSettings;
    use crate::crypto::SecureString;
    use crate::process::testing::FakeRunner;
    use tempfile::TempDir;

    #[test]
    fn test_dump_command_with_host_flags() {
        let db = DatabaseSettings {
            username: Some("backup".to_string()),
            password: Some(SecureString::from("s3cr3t-pass")),
            ..DatabaseSettings::default()
        };

        let spec = dump_command(&db, Path::new("/srv/backups/full-x"));
        assert_eq!(spec.program, "mongodump");
        assert_eq!(spec.flag_value("--host"), Some("localhost"));
        assert_eq!(spec.flag_value("--port"), Some("27017"));
        assert_eq!(spec.flag_value("--db"), Some("app"));
        assert_eq!(spec.flag_value("--authenticationDatabase"), Some("admin"));
        assert_eq!(spec.flag_value("--out"), Some("/srv/backups/full-x/database"));
        assert!(!spec.redacted().contains("s3cr3t-pass"));
    }

    #[test]
    fn test_uri_replaces_host_flags() {
        let db = DatabaseSettings {
            uri: Some("mongodb://u:p@db.internal/app".to_string()),
            ..DatabaseSettings::default()
        };

        let spec = dump_command(&db, Path::new("/tmp/full-x"));
        assert_eq!(spec.flag_value("--uri"), Some("mongodb://u:p@db.internal/app"));
        assert_eq!(spec.flag_value("--host"), None);
        assert!(spec.redacted().contains("--uri=***"));
    }

    #[test]
    fn test_restore_command_drops_first() {
        let spec = restore_command(&DatabaseSettings::default(), Path::new("/tmp/stage/full-x"));
        assert_eq!(spec.program, "mongorestore");
        assert!(spec.args.contains(&"--drop".to_string()));
        assert_eq!(spec.args.last().map(String::as_str), Some("/tmp/stage/full-x/database"));
        assert_eq!(spec.flag_value("--db"), None);
    }

    #[tokio::test]
    async fn test_backup_database_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::failing("mongodump");

        let err = backup_database(&runner, &DatabaseSettings::default(), temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, KeepsakeError::Database(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_backup_files_notes_missing_directories() {
        let temp = TempDir::new().unwrap();
        let settings = BackupSettings::rooted_at(temp.path());
        fs::create_dir_all(&settings.files.uploads_dir).unwrap();
        fs::write(settings.files.uploads_dir.join("a.png"), b"png").unwrap();

        let work = temp.path().join("work");
        let result = backup_files(&settings.files, &settings.backup_dir, &work).unwrap();

        assert!(result.success);
        assert!(work.join("files/uploads/a.png").exists());
        assert_eq!(result.skipped.len(), 1);
        assert!(result.skipped[0].starts_with("logs directory not found"));
    }

    #[test]
    fn test_backup_files_leaves_out_nested_backup_dir() {
        let temp = TempDir::new().unwrap();
        let mut settings = BackupSettings::rooted_at(temp.path());
        settings.backup_dir = settings.files.uploads_dir.join("backups");
        fs::create_dir_all(&settings.backup_dir).unwrap();
        fs::write(settings.files.uploads_dir.join("a.png"), b"png").unwrap();

        let work = settings.backup_dir.join("full-1");
        fs::create_dir_all(&work).unwrap();
        let result = backup_files(&settings.files, &settings.backup_dir, &work).unwrap();

        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("Copied 1 files from uploads"));
        assert!(work.join("files/uploads/a.png").exists());
        assert!(!work.join("files/uploads/backups").exists());
    }

    #[test]
    fn test_backup_configuration_skips_missing_files() {
        let temp = TempDir::new().unwrap();
        let settings = BackupSettings::rooted_at(temp.path());
        fs::write(temp.path().join(".env"), "A=1\n").unwrap();
        fs::write(temp.path().join("package.json"), "{}").unwrap();

        let work = temp.path().join("work");
        let result = backup_configuration(&settings.files, &work).unwrap();

        assert!(result.success);
        assert!(work.join("config/.env").exists());
        assert!(work.join("config/package.json").exists());
        assert_eq!(result.skipped, vec![".env.local", ".env.production"]);
    }

    #[test]
    fn test_restore_files_copies_back() {
        let temp = TempDir::new().unwrap();
        let settings = BackupSettings::rooted_at(temp.path());
        let payload = temp.path().join("payload");
        fs::create_dir_all(payload.join("files/logs")).unwrap();
        fs::write(payload.join("files/logs/app.log"), b"line").unwrap();

        let result = restore_files(&settings.files, &payload).unwrap();

        assert!(result.success);
        assert_eq!(fs::read(settings.files.logs_dir.join("app.log")).unwrap(), b"line");
        assert_eq!(result.skipped, vec!["uploads not present in backup"]);
    }
}
