//! Path management for Keepsake
//!
//! Everything Keepsake reads or writes is anchored at a project root: the
//! deployment directory of the application being backed up.
//!
//! ## Path Resolution Order
//!
//! 1. `KEEPSAKE_PROJECT_ROOT` environment variable (if set)
//! 2. The current working directory

use std::path::{Path, PathBuf};

use crate::error::KeepsakeError;

/// Manages all paths used by Keepsake
#[derive(Debug, Clone)]
pub struct KeepsakePaths {
    /// Root directory of the application deployment
    project_root: PathBuf,
}

impl KeepsakePaths {
    /// Create a new KeepsakePaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self, KeepsakeError> {
        let project_root = match std::env::var("KEEPSAKE_PROJECT_ROOT") {
            Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
            _ => std::env::current_dir().map_err(|e| {
                KeepsakeError::Config(format!("Could not determine current directory: {}", e))
            })?,
        };

        Ok(Self { project_root })
    }

    /// Create KeepsakePaths with a custom project root (useful for testing)
    pub fn with_project_root(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Get the project root
    pub fn project_root(&self) -> &PathBuf {
        &self.project_root
    }

    /// Get the path to the environment file (`<root>/.env`)
    pub fn env_file(&self) -> PathBuf {
        self.project_root.join(".env")
    }

    /// Get the path to the secret rotation metadata
    pub fn secret_metadata_file(&self) -> PathBuf {
        self.project_root.join(".secret-metadata.json")
    }

    /// Get the path to the secret validation audit log
    pub fn secret_audit_log(&self) -> PathBuf {
        self.project_root.join(".secret-audit.jsonl")
    }

    /// Resolve a configured path against the project root
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
