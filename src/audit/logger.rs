//! Bounded audit logger
//!
//! Entries are stored one JSON object per line (JSONL). The log keeps at
//! most `max_entries` lines; the oldest are evicted first. Every write
//! rewrites the file atomically, which is fine at this size.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::warn;

use crate::error::{KeepsakeError, KeepsakeResult};
use crate::storage::file_io::{restrict_permissions, write_bytes_atomic};

use super::entry::AuditEntry;

/// Default cap on retained entries
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Handles writing audit entries to the audit log file
pub struct AuditLogger {
    /// Path to the audit log file
    log_path: PathBuf,
    max_entries: usize,
}

impl AuditLogger {
    /// Create a logger keeping the default number of entries
    pub fn new(log_path: PathBuf) -> Self {
        Self::with_capacity(log_path, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(log_path: PathBuf, max_entries: usize) -> Self {
        Self {
            log_path,
            max_entries: max_entries.max(1),
        }
    }

    /// Append an entry, evicting the oldest beyond the cap
    pub fn log(&self, entry: &AuditEntry) -> KeepsakeResult<()> {
        let mut lines = self.read_lines()?;

        let json = serde_json::to_string(entry)
            .map_err(|e| KeepsakeError::Json(format!("Failed to serialize audit entry: {}", e)))?;
        lines.push(json);

        let excess = lines.len().saturating_sub(self.max_entries);
        lines.drain(..excess);

        let mut contents = lines.join("\n");
        contents.push('\n');

        write_bytes_atomic(&self.log_path, contents.as_bytes())?;
        restrict_permissions(&self.log_path)
    }

    /// Raw non-empty lines, oldest first
    fn read_lines(&self) -> KeepsakeResult<Vec<String>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| KeepsakeError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut lines = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                KeepsakeError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Read all audit entries, oldest first
    ///
    /// Lines that do not parse are skipped with a warning.
    pub fn read_all(&self) -> KeepsakeResult<Vec<AuditEntry>> {
        let mut entries = Vec::new();

        for (index, line) in self.read_lines()?.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping unreadable audit entry"),
            }
        }

        Ok(entries)
    }

    /// Read the most recent N entries from the log
    pub fn read_recent(&self, count: usize) -> KeepsakeResult<Vec<AuditEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::SecretAction;
    use crate::config::Environment;
    use std::fs;
    use tempfile::TempDir;

    fn log_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join(".secret-audit.jsonl")
    }

    fn create_test_logger(capacity: usize) -> (AuditLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let logger = AuditLogger::with_capacity(log_path(&temp_dir), capacity);
        (logger, temp_dir)
    }

    fn entry(name: &str) -> AuditEntry {
        AuditEntry::generation([name], Environment::Development)
    }

    #[test]
    fn test_log_and_read() {
        let (logger, _temp) = create_test_logger(10);

        logger.log(&entry("JWT_SECRET")).unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, SecretAction::Generate);
        assert_eq!(entries[0].secrets, vec!["JWT_SECRET"]);
    }

    #[test]
    fn test_oldest_entries_are_evicted() {
        let (logger, _temp) = create_test_logger(3);

        for i in 0..5 {
            logger.log(&entry(&format!("SECRET_{}", i))).unwrap();
        }

        assert_eq!(logger.read_lines().unwrap().len(), 3);
        let names: Vec<String> = logger
            .read_all()
            .unwrap()
            .into_iter()
            .map(|e| e.secrets[0].clone())
            .collect();
        assert_eq!(names, vec!["SECRET_2", "SECRET_3", "SECRET_4"]);
    }

    #[test]
    fn test_default_capacity() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(log_path(&temp));

        let line = serde_json::to_string(&entry("OLD")).unwrap();
        let seeded = vec![line; DEFAULT_MAX_ENTRIES].join("\n");
        fs::write(log_path(&temp), seeded).unwrap();

        for _ in 0..5 {
            logger.log(&entry("JWT_SECRET")).unwrap();
        }
        assert_eq!(logger.read_lines().unwrap().len(), DEFAULT_MAX_ENTRIES);
        assert_eq!(logger.read_recent(5).unwrap()[0].secrets, vec!["JWT_SECRET"]);
    }

    #[test]
    fn test_read_recent() {
        let (logger, _temp) = create_test_logger(100);

        for i in 0..10 {
            logger.log(&entry(&format!("S{}", i))).unwrap();
        }

        let recent = logger.read_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].secrets, vec!["S7"]);
        assert_eq!(recent[2].secrets, vec!["S9"]);
    }

    #[test]
    fn test_empty_log() {
        let (logger, temp) = create_test_logger(10);

        assert!(!log_path(&temp).exists());
        assert_eq!(logger.read_lines().unwrap().len(), 0);
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let (logger, temp) = create_test_logger(10);
        logger.log(&entry("A")).unwrap();
        let mut contents = fs::read_to_string(log_path(&temp)).unwrap();
        contents.push_str("{ truncated\n");
        fs::write(log_path(&temp), contents).unwrap();

        logger.log(&entry("B")).unwrap();

        assert_eq!(logger.read_lines().unwrap().len(), 3);
        assert_eq!(logger.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_survives_restart() {
        let (logger, temp) = create_test_logger(10);
        logger.log(&entry("A")).unwrap();

        let logger2 = AuditLogger::new(log_path(&temp));
        assert_eq!(logger2.read_all().unwrap().len(), 1);
        assert!(log_path(&temp).exists());
    }
}
