//! Runtime settings for Keepsake
//!
//! All configuration is environment driven. [`Settings::load`] reads the
//! process environment first and falls back to the project's `.env` file,
//! validating every value once so the rest of the crate works with typed
//! fields only.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::env_file::load_env_file;
use super::paths::KeepsakePaths;
use crate::crypto::SecureString;
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::scheduler::Cadence;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = KeepsakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(KeepsakeError::Config(format!("Unknown environment: {}", other))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How many backups survive in each age tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Backups 0-7 days old
    pub daily: u32,
    /// Backups 8-30 days old
    pub weekly: u32,
    /// Backups older than 30 days
    pub monthly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily: 7,
            weekly: 4,
            monthly: 12,
        }
    }
}

/// Compression settings
#[derive(Debug, Clone, Copy)]
pub struct CompressionSettings {
    pub enabled: bool,
    /// gzip level, 0-9
    pub level: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 6,
        }
    }
}

/// Supported backup encryption algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionAlgorithm {
    #[default]
    Aes256Gcm,
}

impl FromStr for EncryptionAlgorithm {
    type Err = KeepsakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-256-gcm" | "aes256gcm" => Ok(EncryptionAlgorithm::Aes256Gcm),
            other => Err(KeepsakeError::Config(format!(
                "Unsupported encryption algorithm: {} (supported: aes-256-gcm)",
                other
            ))),
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionAlgorithm::Aes256Gcm => write!(f, "aes-256-gcm"),
        }
    }
}

/// Encryption settings
#[derive(Debug, Clone, Default)]
pub struct EncryptionSettings {
    pub enabled: bool,
    pub algorithm: EncryptionAlgorithm,
    /// Passphrase the file key is derived from
    pub key: Option<SecureString>,
}

/// Database connection and tooling
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Full connection string; takes precedence over host/port/name
    pub uri: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: Option<String>,
    pub password: Option<SecureString>,
    pub auth_source: String,
    /// Dump tool executable
    pub dump_command: String,
    /// Restore tool executable
    pub restore_command: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: None,
            host: "localhost".to_string(),
            port: 27017,
            name: "app".to_string(),
            username: None,
            password: None,
            auth_source: "admin".to_string(),
            dump_command: "mongodump".to_string(),
            restore_command: "mongorestore".to_string(),
        }
    }
}

/// Application directories and files captured by a backup
#[derive(Debug, Clone)]
pub struct FileSettings {
    pub uploads_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Directory the config files are looked up in
    pub config_dir: PathBuf,
    pub config_files: Vec<String>,
}

/// Notification targets; recorded only, nothing is sent
#[derive(Debug, Clone, Default)]
pub struct NotificationSettings {
    pub webhook_url: Option<String>,
    pub email: Option<String>,
    pub on_success: bool,
    pub on_failure: bool,
}

/// Everything the backup service needs
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub backup_dir: PathBuf,
    pub retention: RetentionPolicy,
    pub compression: CompressionSettings,
    pub encryption: EncryptionSettings,
    pub database: DatabaseSettings,
    pub files: FileSettings,
    pub notifications: NotificationSettings,
}

impl BackupSettings {
    /// Settings rooted in a single directory, used by tests and tooling
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            backup_dir: root.join("backups"),
            retention: RetentionPolicy::default(),
            compression: CompressionSettings::default(),
            encryption: EncryptionSettings::default(),
            database: DatabaseSettings::default(),
            files: FileSettings {
                uploads_dir: root.join("uploads"),
                logs_dir: root.join("logs"),
                config_dir: root.clone(),
                config_files: default_config_files(),
            },
            notifications: NotificationSettings::default(),
        }
    }
}

/// Cron expressions per cadence
#[derive(Debug, Clone, Default)]
pub struct ScheduleSettings {
    pub enabled: bool,
    pub daily: Option<String>,
    pub weekly: Option<String>,
    pub monthly: Option<String>,
}

impl ScheduleSettings {
    /// The configured expression for a cadence
    pub fn expression(&self, cadence: Cadence) -> Option<&str> {
        match cadence {
            Cadence::Daily => self.daily.as_deref(),
            Cadence::Weekly => self.weekly.as_deref(),
            Cadence::Monthly => self.monthly.as_deref(),
        }
    }
}

/// Secret policy knobs exposed through the environment
#[derive(Debug, Clone)]
pub struct SecretSettings {
    pub rotation_max_age_days: u32,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self {
            rotation_max_age_days: 90,
        }
    }
}

/// Keepsake settings, validated once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub backup: BackupSettings,
    pub schedule: ScheduleSettings,
    pub secrets: SecretSettings,
}

fn default_config_files() -> Vec<String> {
    [".env", ".env.local", ".env.production", "package.json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Typed accessors over a key lookup
struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvReader<'_> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, key: &str, default: bool) -> KeepsakeResult<bool> {
        match self.string(key) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(KeepsakeError::Config(format!(
                    "{} must be a boolean, got '{}'",
                    key, value
                ))),
            },
        }
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> KeepsakeResult<T> {
        match self.string(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| {
                KeepsakeError::Config(format!("{} must be a number, got '{}'", key, value))
            }),
        }
    }
}

impl Settings {
    /// Load settings from the process environment and the project `.env`
    ///
    /// Process environment variables win over the file.
    pub fn load(paths: &KeepsakePaths) -> KeepsakeResult<Self> {
        let file_values = load_env_file(&paths.env_file())?;
        let lookup = |key: &str| std::env::var(key).ok().or_else(|| file_values.get(key).cloned());
        Self::from_lookup(paths, &lookup)
    }

    /// Build settings from an in-memory map (tests, embedding)
    pub fn from_map(paths: &KeepsakePaths, values: &BTreeMap<String, String>) -> KeepsakeResult<Self> {
        let lookup = |key: &str| values.get(key).cloned();
        Self::from_lookup(paths, &lookup)
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup(
        paths: &KeepsakePaths,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> KeepsakeResult<Self> {
        let env = EnvReader { lookup };

        let environment = match env.string("APP_ENV").or_else(|| env.string("NODE_ENV")) {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        let retention = RetentionPolicy {
            daily: env.number("BACKUP_RETENTION_DAILY", 7)?,
            weekly: env.number("BACKUP_RETENTION_WEEKLY", 4)?,
            monthly: env.number("BACKUP_RETENTION_MONTHLY", 12)?,
        };

        let compression = CompressionSettings {
            enabled: env.flag("BACKUP_COMPRESSION", true)?,
            level: env.number("BACKUP_COMPRESSION_LEVEL", 6)?,
        };
        if compression.level > 9 {
            return Err(KeepsakeError::Config(format!(
                "BACKUP_COMPRESSION_LEVEL must be between 0 and 9, got {}",
                compression.level
            )));
        }

        let encryption = EncryptionSettings {
            enabled: env.flag("BACKUP_ENCRYPTION", false)?,
            algorithm: env.string_or("BACKUP_ENCRYPTION_ALGORITHM", "aes-256-gcm").parse()?,
            key: env.string("BACKUP_ENCRYPTION_KEY").map(SecureString::from),
        };

        let defaults = DatabaseSettings::default();
        let database = DatabaseSettings {
            uri: env.string("MONGODB_URI"),
            host: env.string_or("DB_HOST", &defaults.host),
            port: env.number("DB_PORT", defaults.port)?,
            name: env.string_or("DB_NAME", &defaults.name),
            username: env.string("DB_USER"),
            password: env.string("DB_PASSWORD").map(SecureString::from),
            auth_source: env.string_or("DB_AUTH_SOURCE", &defaults.auth_source),
            dump_command: env.string_or("DB_DUMP_COMMAND", &defaults.dump_command),
            restore_command: env.string_or("DB_RESTORE_COMMAND", &defaults.restore_command),
        };

        let config_files = env
            .string("BACKUP_CONFIG_FILES")
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(default_config_files);

        let files = FileSettings {
            uploads_dir: paths.resolve(env.string_or("UPLOADS_DIR", "uploads")),
            logs_dir: paths.resolve(env.string_or("LOGS_DIR", "logs")),
            config_dir: paths.project_root().clone(),
            config_files,
        };

        let notifications = NotificationSettings {
            webhook_url: env.string("BACKUP_NOTIFY_WEBHOOK"),
            email: env.string("BACKUP_NOTIFY_EMAIL"),
            on_success: env.flag("BACKUP_NOTIFY_ON_SUCCESS", false)?,
            on_failure: env.flag("BACKUP_NOTIFY_ON_FAILURE", true)?,
        };

        let backup = BackupSettings {
            backup_dir: paths.resolve(env.string_or("BACKUP_DIR", "backups")),
            retention,
            compression,
            encryption,
            database,
            files,
            notifications,
        };

        let schedule = ScheduleSettings {
            enabled: env.flag("BACKUP_SCHEDULER_ENABLED", true)?,
            daily: env.string("BACKUP_SCHEDULE_DAILY"),
            weekly: env.string("BACKUP_SCHEDULE_WEEKLY"),
            monthly: env.string("BACKUP_SCHEDULE_MONTHLY"),
        };

        let secrets = SecretSettings {
            rotation_max_age_days: env.number("SECRET_ROTATION_DAYS", 90)?,
        };

        Ok(Self {
            environment,
            backup,
            schedule,
            secrets,
        })
    }
}
