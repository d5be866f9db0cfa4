//! Backup data model
//!
//! [`BackupMetadata`] is the `metadata.json` descriptor written into every
//! backup. Its JSON keys are camelCase so existing tooling that reads the
//! descriptor keeps working.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::Cadence;

/// Kind of backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// Self-contained snapshot of database, files and configuration
    Full,
    /// Full re-capture linked to the last full backup
    Incremental,
}

impl BackupType {
    /// Directory/file name prefix for this type
    pub fn prefix(&self) -> &'static str {
        match self {
            BackupType::Full => "full",
            BackupType::Incremental => "incremental",
        }
    }

    /// Artifact base name: `<type>-<id>`
    pub fn artifact_name(&self, id: &str) -> String {
        format!("{}-{}", self.prefix(), id)
    }

    /// Split an artifact base name into type and id
    pub fn parse_artifact_name(name: &str) -> Option<(BackupType, &str)> {
        [BackupType::Full, BackupType::Incremental]
            .into_iter()
            .find_map(|t| {
                name.strip_prefix(t.prefix())
                    .and_then(|rest| rest.strip_prefix('-'))
                    .filter(|id| !id.is_empty())
                    .map(|id| (t, id))
            })
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Outcome of one sub-backup (database, files or configuration)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub success: bool,
    /// Captured tool output or a summary of what was copied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sources that were absent and therefore not captured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl ComponentResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            success: true,
            output: (!output.is_empty()).then_some(output),
            error: None,
            skipped: Vec::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            skipped: Vec::new(),
        }
    }

    /// A component that was intentionally not captured
    pub fn not_captured(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            output: None,
            error: None,
            skipped: vec![reason.into()],
        }
    }
}

/// Per-component results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupComponents {
    #[serde(default)]
    pub database: ComponentResult,
    #[serde(default)]
    pub files: ComponentResult,
    #[serde(default)]
    pub configuration: ComponentResult,
}

/// Descriptor persisted as `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_backup_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Milliseconds spent capturing the payload
    pub duration: u64,
    /// Total bytes of the captured payload
    pub size: u64,
    pub components: BackupComponents,
    #[serde(default)]
    pub scheduled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence: Option<Cadence>,
}

impl BackupMetadata {
    /// Artifact base name: `<type>-<id>`
    pub fn artifact_name(&self) -> String {
        self.backup_type.artifact_name(&self.id)
    }
}

/// On-disk form of a stored backup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Directory,
    Tar,
    TarGz,
    EncryptedTar,
    EncryptedTarGz,
}

impl ArtifactKind {
    /// Every kind, in the order listing probes for them
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::EncryptedTarGz,
        ArtifactKind::EncryptedTar,
        ArtifactKind::TarGz,
        ArtifactKind::Tar,
        ArtifactKind::Directory,
    ];

    /// Suffix appended to the artifact base name
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Directory => "",
            ArtifactKind::Tar => ".tar",
            ArtifactKind::TarGz => ".tar.gz",
            ArtifactKind::EncryptedTar => ".tar.enc",
            ArtifactKind::EncryptedTarGz => ".tar.gz.enc",
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, ArtifactKind::EncryptedTar | ArtifactKind::EncryptedTarGz)
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, ArtifactKind::TarGz | ArtifactKind::EncryptedTarGz)
    }

    /// The kind left after decrypting this one
    pub fn decrypted(&self) -> ArtifactKind {
        match self {
            ArtifactKind::EncryptedTar => ArtifactKind::Tar,
            ArtifactKind::EncryptedTarGz => ArtifactKind::TarGz,
            other => *other,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Directory => write!(f, "directory"),
            ArtifactKind::Tar => write!(f, "tar"),
            ArtifactKind::TarGz => write!(f, "tar.gz"),
            ArtifactKind::EncryptedTar => write!(f, "tar (encrypted)"),
            ArtifactKind::EncryptedTarGz => write!(f, "tar.gz (encrypted)"),
        }
    }
}

/// A stored backup found by listing
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub metadata: BackupMetadata,
    /// Path of the artifact (directory or file)
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Bytes the artifact currently occupies
    pub artifact_size: u64,
}

impl BackupInfo {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn backup_type(&self) -> BackupType {
        self.metadata.backup_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.metadata.timestamp
    }
}

/// Options for a single backup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupOptions {
    pub scheduled: bool,
    pub cadence: Option<Cadence>,
}

impl BackupOptions {
    /// Operator-triggered backup
    pub fn manual() -> Self {
        Self::default()
    }

    /// Backup fired by the scheduler
    pub fn scheduled(cadence: Cadence) -> Self {
        Self {
            scheduled: true,
            cadence: Some(cadence),
        }
    }
}

/// Result of a successful backup
#[derive(Debug, Clone)]
pub struct BackupResult {
    pub backup_id: String,
    /// Final artifact path
    pub path: PathBuf,
    pub metadata: BackupMetadata,
}

/// Result of a restore
#[derive(Debug, Clone)]
pub struct RestoreResult {
    pub backup_id: String,
    pub backup_type: BackupType,
    pub backup_timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub database: ComponentResult,
    pub files: ComponentResult,
}

impl RestoreResult {
    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.database.success {
            parts.push("database");
        }
        if self.files.success {
            parts.push("files");
        }
        format!("Restored: {}", parts.join(", "))
    }
}

/// What a retention pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    /// Ids selected for deletion whose removal failed
    pub failed: Vec<String>,
}

/// Lifecycle of one backup run, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupPhase {
    Creating,
    DatabaseDone,
    FilesDone,
    ConfigDone,
    MetadataWritten,
    Compressed,
    Encrypted,
    Stored,
    /// Failed and the working directory was removed
    FailedRolledBack,
    /// Failed and the working directory could not be removed
    FailedOrphaned,
}

impl fmt::Display for BackupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupPhase::Creating => "creating",
            BackupPhase::DatabaseDone => "database_done",
            BackupPhase::FilesDone => "files_done",
            BackupPhase::ConfigDone => "config_done",
            BackupPhase::MetadataWritten => "metadata_written",
            BackupPhase::Compressed => "compressed",
            BackupPhase::Encrypted => "encrypted",
            BackupPhase::Stored => "stored",
            BackupPhase::FailedRolledBack => "failed_rolled_back",
            BackupPhase::FailedOrphaned => "failed_orphaned",
        };
        write!(f, "{}", name)
    }
}
