//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod backup;
pub mod config;
pub mod schedule;
pub mod secrets;

pub use backup::{
    handle_cleanup_backups, handle_create_backup, handle_delete_backup, handle_list_backups,
    handle_restore_backup, RESTORE_USAGE,
};
pub use config::{format_settings, handle_config_command};
pub use schedule::{handle_schedule_command, ScheduleCommands};
pub use secrets::{handle_secrets_command, SecretsCommands};
