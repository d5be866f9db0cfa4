//! Keepsake - backups and secret hygiene for self-hosted web applications
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Project paths, `.env` handling and typed settings
//! - `error`: Custom error types
//! - `backup`: Full/incremental backups, retention, restore
//! - `scheduler`: Cron-driven backup cadences
//! - `secrets`: Secret policy, generation and rotation tracking
//! - `audit`: Bounded audit log of secret operations
//! - `crypto`: Key derivation and file encryption
//! - `process`: External tool execution
//! - `storage`: Atomic JSON and file writes
//! - `cli`, `display`, `logging`: The `keepsake` binary's surface
//!
//! # Example
//!
//! ```rust,ignore
//! use keepsake::backup::{BackupOptions, BackupService};
//! use keepsake::config::{KeepsakePaths, Settings};
//!
//! let paths = KeepsakePaths::new()?;
//! let settings = Settings::load(&paths)?;
//! let service = BackupService::with_system_runner(settings.backup);
//! let result = service.create_full_backup(BackupOptions::manual()).await?;
//! ```

pub mod audit;
pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod logging;
pub mod process;
pub mod scheduler;
pub mod secrets;
pub mod storage;

pub use error::{KeepsakeError, KeepsakeResult};
