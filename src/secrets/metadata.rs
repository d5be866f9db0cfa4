//! Rotation metadata for generated secrets
//!
//! Stored as `.secret-metadata.json`: creation time, length and a truncated
//! SHA-256 of each secret. The value itself is never written.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::fingerprint;
use crate::error::KeepsakeResult;
use crate::storage::file_io::{read_json, restrict_permissions, write_json_atomic};

/// Hex characters of the digest kept per secret
pub const HASH_HEX_CHARS: usize = 16;

/// What is remembered about one secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub created: DateTime<Utc>,
    pub length: usize,
    pub hash: String,
}

impl SecretRecord {
    pub fn for_value(value: &str, created: DateTime<Utc>) -> Self {
        Self {
            created,
            length: value.chars().count(),
            hash: fingerprint(value, HASH_HEX_CHARS),
        }
    }

    /// Whole days since the secret was recorded
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created).num_days()
    }

    /// Whether `value` is the secret this record describes
    pub fn matches(&self, value: &str) -> bool {
        self.hash == fingerprint(value, HASH_HEX_CHARS)
    }
}

/// Reads and updates the metadata file
pub struct SecretMetadataStore {
    path: PathBuf,
}

impl SecretMetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// All records; empty when the file does not exist yet
    pub fn load(&self) -> KeepsakeResult<BTreeMap<String, SecretRecord>> {
        read_json(&self.path)
    }

    /// Record freshly generated secrets, keeping records for other names
    pub fn record<'a, I>(&self, secrets: I, created: DateTime<Utc>) -> KeepsakeResult<()>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut records = self.load()?;
        for (name, value) in secrets {
            records.insert(name.clone(), SecretRecord::for_value(value, created));
        }
        write_json_atomic(&self.path, &records)?;
        restrict_permissions(&self.path)
    }
}
