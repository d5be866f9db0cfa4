//! Display formatting for terminal output
//!
//! Everything here returns a `String`; printing is left to the CLI layer.

pub mod backup;
pub mod schedule;
pub mod secrets;

pub use backup::{
    format_backup_list, format_backup_result, format_cleanup_report, format_duration_ms,
    format_restore_result, format_size,
};
pub use schedule::format_schedule_status;
pub use secrets::{format_generated_secrets, format_validation_report};
