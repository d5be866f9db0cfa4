//! Configuration module for Keepsake
//!
//! This module provides configuration management including:
//! - Project-root path resolution
//! - `.env` file parsing and updating
//! - Typed, environment-driven settings

pub mod env_file;
pub mod paths;
pub mod settings;

pub use paths::KeepsakePaths;
pub use settings::{
    BackupSettings, CompressionSettings, DatabaseSettings, EncryptionAlgorithm,
    EncryptionSettings, Environment, FileSettings, NotificationSettings, RetentionPolicy,
    ScheduleSettings, SecretSettings, Settings,
};
