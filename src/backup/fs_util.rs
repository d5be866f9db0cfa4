//! Filesystem helpers for backup payloads
//!
//! These are synchronous; the service runs them on the blocking pool.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{KeepsakeError, KeepsakeResult};

/// Log a walk error and drop the entry
fn log_and_skip_walk_err(result: Result<DirEntry, walkdir::Error>) -> Option<DirEntry> {
    match result {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(error = %e, "Skipping unreadable entry");
            None
        }
    }
}

fn walk(root: &Path) -> WalkDir {
    WalkDir::new(root).min_depth(1).follow_links(false)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Recursively copy `source` into `destination`, returning the number of files copied
///
/// Anything at or below `exclude` is left out. Symlinks and special files
/// are not part of a backup.
pub fn copy_dir_recursive(
    source: &Path,
    destination: &Path,
    exclude: Option<&Path>,
) -> KeepsakeResult<u64> {
    if !source.is_dir() {
        return Err(KeepsakeError::Io(format!(
            "Failed to read {}: not a directory",
            source.display()
        )));
    }
    fs::create_dir_all(destination).map_err(|e| {
        KeepsakeError::Io(format!("Failed to create {}: {}", destination.display(), e))
    })?;

    let source = canonical(source);
    let exclude = exclude.map(canonical);

    let entries = walk(&source)
        .into_iter()
        .filter_entry(|entry| exclude.as_deref().map_or(true, |skip| entry.path() != skip))
        .filter_map(log_and_skip_walk_err);

    let mut copied = 0;
    for entry in entries {
        let Ok(relative) = entry.path().strip_prefix(&source) else {
            continue;
        };
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                KeepsakeError::Io(format!("Failed to create {}: {}", target.display(), e))
            })?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| {
                KeepsakeError::Io(format!("Failed to copy {}: {}", entry.path().display(), e))
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Total bytes under a path: the file size, or the sum of files below a directory
pub fn path_size(path: &Path) -> KeepsakeResult<u64> {
    let metadata = fs::symlink_metadata(path)
        .map_err(|e| KeepsakeError::Io(format!("Failed to stat {}: {}", path.display(), e)))?;

    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    Ok(walk(path)
        .into_iter()
        .filter_map(log_and_skip_walk_err)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum())
}

/// Remove a file or directory tree
pub fn remove_path(path: &Path) -> KeepsakeResult<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|e| KeepsakeError::Io(format!("Failed to remove {}: {}", path.display(), e)))
}

/// List file names (recursively, relative to `root`) for diagnostics and tests
pub fn relative_files(root: &Path) -> KeepsakeResult<Vec<String>> {
    if !root.is_dir() {
        return Err(KeepsakeError::Io(format!(
            "Failed to read {}: not a directory",
            root.display()
        )));
    }

    let mut files: Vec<String> = walk(root)
        .into_iter()
        .filter_map(log_and_skip_walk_err)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("avatars/2026")).unwrap();
        fs::write(root.join("avatars/2026/a.png"), vec![0u8; 100]).unwrap();
        fs::write(root.join("readme.txt"), b"hello").unwrap();
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("uploads");
        seed(&source);

        let target = temp.path().join("copy");
        let copied = copy_dir_recursive(&source, &target, None).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            relative_files(&target).unwrap(),
            vec!["avatars/2026/a.png", "readme.txt"]
        );
    }

    #[test]
    fn test_copy_skips_excluded_subtree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("uploads");
        seed(&source);
        fs::create_dir_all(source.join("backups/full-1")).unwrap();
        fs::write(source.join("backups/full-1/metadata.json"), b"{}").unwrap();

        let target = temp.path().join("copy");
        let copied = copy_dir_recursive(&source, &target, Some(&source.join("backups"))).unwrap();

        assert_eq!(copied, 2);
        assert!(!target.join("backups").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_does_not_follow_symlinks() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("uploads");
        seed(&source);
        let outside = temp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(&outside, source.join("linked")).unwrap();

        let target = temp.path().join("copy");
        let copied = copy_dir_recursive(&source, &target, None).unwrap();

        assert_eq!(copied, 2);
        assert!(!target.join("linked").exists());
        assert_eq!(path_size(&source).unwrap(), 105);
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        assert!(copy_dir_recursive(&temp.path().join("missing"), &temp.path().join("copy"), None).is_err());
    }

    #[test]
    fn test_path_size() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("uploads");
        seed(&source);

        assert_eq!(path_size(&source).unwrap(), 105);
        assert_eq!(path_size(&source.join("readme.txt")).unwrap(), 5);
        assert!(path_size(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_remove_path() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("uploads");
        seed(&source);

        remove_path(&source.join("readme.txt")).unwrap();
        remove_path(&source).unwrap();
        assert!(!source.exists());
        assert!(remove_path(&source).is_err());
    }
}
