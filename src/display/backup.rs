//! Backup display formatting
//!
//! Formats backup listings and results for terminal output.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::backup::{BackupInfo, BackupResult, CleanupReport, RestoreResult};

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    backup_type: String,
    #[tabled(rename = "Created")]
    timestamp: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Stored as")]
    kind: String,
}

impl From<&BackupInfo> for BackupRow {
    fn from(info: &BackupInfo) -> Self {
        let metadata = &info.metadata;
        let mut backup_type = metadata.backup_type.to_string();
        if let Some(cadence) = metadata.cadence {
            backup_type = format!("{} ({})", backup_type, cadence);
        }

        Self {
            id: metadata.id.clone(),
            backup_type,
            timestamp: metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            size: format_size(info.artifact_size),
            duration: format_duration_ms(metadata.duration),
            kind: info.kind.to_string(),
        }
    }
}

/// Format a list of backups as a table
pub fn format_backup_list(backups: &[BackupInfo]) -> String {
    if backups.is_empty() {
        return "No backups found".to_string();
    }

    let rows: Vec<BackupRow> = backups.iter().map(BackupRow::from).collect();
    let mut output = Table::new(rows).with(Style::rounded()).to_string();
    output.push_str(&format!("\nTotal: {} backup(s)", backups.len()));
    output
}

/// Summary lines for a freshly created backup
pub fn format_backup_result(result: &BackupResult) -> String {
    let metadata = &result.metadata;
    let mut lines = vec![
        format!("✓ {} backup created: {}", metadata.backup_type, result.backup_id),
        format!("  Location: {}", result.path.display()),
        format!("  Duration: {}", format_duration_ms(metadata.duration)),
        format!("  Size:     {}", format_size(metadata.size)),
    ];
    if let Some(base) = &metadata.base_backup_id {
        lines.push(format!("  Base:     {}", base));
    }

    let components = [
        ("database", &metadata.components.database),
        ("files", &metadata.components.files),
        ("configuration", &metadata.components.configuration),
    ];
    for (label, component) in components {
        for skipped in &component.skipped {
            lines.push(format!("  Skipped ({}): {}", label, skipped));
        }
    }

    lines.join("\n")
}

pub fn format_restore_result(result: &RestoreResult) -> String {
    format!(
        "✓ {}\n  Backup taken: {}",
        result.summary(),
        result.backup_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub fn format_cleanup_report(report: &CleanupReport) -> String {
    let mut lines = vec![format!(
        "✓ Retention cleanup: {} kept, {} deleted",
        report.kept.len(),
        report.deleted.len()
    )];
    for id in &report.deleted {
        lines.push(format!("  deleted {}", id));
    }
    for id in &report.failed {
        lines.push(format!("  ✗ could not delete {}", id));
    }
    lines.join("\n")
}

/// Format a byte count with a binary unit
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a millisecond duration compactly
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        return format!("{}ms", ms);
    }

    let seconds = ms as f64 / 1000.0;
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }

    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m {}s", minutes, total_seconds % 60);
    }

    format!("{}h {}m", minutes / 60, minutes % 60)
}
