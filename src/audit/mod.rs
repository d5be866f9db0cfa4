//! Audit logging for secret operations
//!
//! Every secret validation and generation run is recorded in a bounded,
//! line-delimited JSON log (`.secret-audit.jsonl` in the project root).
//!
//! # Architecture
//!
//! - `AuditEntry`: one run, with counts and the names of affected secrets
//! - `AuditLogger`: appends entries and evicts the oldest beyond the cap
//!
//! # Example
//!
//! ```rust,ignore
//! use keepsake::audit::{AuditEntry, AuditLogger};
//!
//! let logger = AuditLogger::new(paths.secret_audit_log());
//! logger.log(&AuditEntry::validation(&report, settings.environment))?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditEntry, SecretAction};
pub use logger::{AuditLogger, DEFAULT_MAX_ENTRIES};
