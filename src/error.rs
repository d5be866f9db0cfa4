//! Custom error types for Keepsake
//!
//! This module defines the error hierarchy for the library using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Keepsake operations
#[derive(Error, Debug)]
pub enum KeepsakeError {
    /// Configuration-related errors (missing key, unwritable backup root, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for inputs
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Encryption errors
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Archive (tar/gzip) errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// An external program could not be started or exited unsuccessfully
    #[error("Command '{program}' failed: {message}")]
    Command { program: String, message: String },

    /// Database dump/restore errors
    #[error("Database error: {0}")]
    Database(String),

    /// Scheduler errors
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// The secret policy rejected the current configuration
    #[error("Secret policy violation: {0}")]
    SecretPolicy(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl KeepsakeError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Create a command failure error
    pub fn command(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for KeepsakeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for KeepsakeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<tokio::task::JoinError> for KeepsakeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(format!("Background task failed: {}", err))
    }
}

/// Result type alias for Keepsake operations
pub type KeepsakeResult<T> = Result<T, KeepsakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeepsakeError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
        assert!(err.is_config());
    }

    #[test]
    fn test_not_found_error() {
        let err = KeepsakeError::backup_not_found("20261017-101530-123-0001-k3q9z1");
        assert_eq!(
            err.to_string(),
            "Backup not found: 20261017-101530-123-0001-k3q9z1"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_command_error() {
        let err = KeepsakeError::command("mongodump", "exit status 1");
        assert_eq!(err.to_string(), "Command 'mongodump' failed: exit status 1");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KeepsakeError = io_err.into();
        assert!(matches!(err, KeepsakeError::Io(_)));
    }
}
