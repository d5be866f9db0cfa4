//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt metadata or environment
//! files on failure.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::KeepsakeError;

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, KeepsakeError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    read_json_required(path)
}

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, KeepsakeError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(KeepsakeError::Storage(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)
        .map_err(|e| KeepsakeError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| KeepsakeError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), KeepsakeError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let mut contents = serde_json::to_vec_pretty(data)
        .map_err(|e| KeepsakeError::Storage(format!("Failed to serialize data: {}", e)))?;
    contents.push(b'\n');
    write_bytes_atomic(path, &contents)
}

/// Write raw bytes to a file atomically
///
/// The temp file lives next to the target so the final rename never
/// crosses a filesystem boundary.
pub fn write_bytes_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<(), KeepsakeError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                KeepsakeError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let temp_path = temp_path_for(path);

    let file = File::create(&temp_path)
        .map_err(|e| KeepsakeError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents)
        .map_err(|e| KeepsakeError::Storage(format!("Failed to write data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| KeepsakeError::Storage(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| KeepsakeError::Storage(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        KeepsakeError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Restrict a file to owner read/write
#[cfg(unix)]
pub fn restrict_permissions<P: AsRef<Path>>(path: P) -> Result<(), KeepsakeError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path.as_ref(), fs::Permissions::from_mode(0o600)).map_err(|e| {
        KeepsakeError::Storage(format!(
            "Failed to set permissions on {}: {}",
            path.as_ref().display(),
            e
        ))
    })
}

/// Restrict a file to owner read/write
#[cfg(not(unix))]
pub fn restrict_permissions<P: AsRef<Path>>(_path: P) -> Result<(), KeepsakeError> {
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
