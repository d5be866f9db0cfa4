//! `config` command: effective settings with secrets redacted

use std::fmt::Write as _;

use crate::config::{KeepsakePaths, Settings};
use crate::scheduler::Cadence;

fn presence<T>(value: &Option<T>) -> &'static str {
    if value.is_some() {
        "set (redacted)"
    } else {
        "not set"
    }
}

fn or_unset(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("not set")
}

/// Render the effective configuration
pub fn format_settings(paths: &KeepsakePaths, settings: &Settings) -> String {
    let backup = &settings.backup;
    let db = &backup.database;
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "Keepsake Configuration");
    let _ = writeln!(out, "======================");
    let _ = writeln!(out, "Project root:     {}", paths.project_root().display());
    let _ = writeln!(out, "Environment file: {}", paths.env_file().display());
    let _ = writeln!(out, "Environment:      {}", settings.environment);
    let _ = writeln!(out);

    let _ = writeln!(out, "Backups:");
    let _ = writeln!(out, "  Directory:   {}", backup.backup_dir.display());
    let _ = writeln!(
        out,
        "  Retention:   {} daily, {} weekly, {} monthly",
        backup.retention.daily, backup.retention.weekly, backup.retention.monthly
    );
    let _ = writeln!(
        out,
        "  Compression: {} (level {})",
        backup.compression.enabled, backup.compression.level
    );
    let _ = writeln!(
        out,
        "  Encryption:  {} ({}, key {})",
        backup.encryption.enabled,
        backup.encryption.algorithm,
        presence(&backup.encryption.key)
    );
    let _ = writeln!(out, "  Uploads:     {}", backup.files.uploads_dir.display());
    let _ = writeln!(out, "  Logs:        {}", backup.files.logs_dir.display());
    let _ = writeln!(out, "  Config files: {}", backup.files.config_files.join(", "));
    let _ = writeln!(out);

    let _ = writeln!(out, "Database:");
    if db.uri.is_some() {
        let _ = writeln!(out, "  URI:       {}", presence(&db.uri));
    } else {
        let _ = writeln!(out, "  Host:      {}:{}", db.host, db.port);
        let _ = writeln!(out, "  Name:      {}", db.name);
        let _ = writeln!(out, "  User:      {}", or_unset(&db.username));
        let _ = writeln!(out, "  Password:  {}", presence(&db.password));
    }
    let _ = writeln!(out, "  Tools:     {} / {}", db.dump_command, db.restore_command);
    let _ = writeln!(out);

    let _ = writeln!(out, "Schedule (enabled: {}):", settings.schedule.enabled);
    for cadence in Cadence::ALL {
        let _ = writeln!(
            out,
            "  {:<8} {}",
            cadence.as_str(),
            settings.schedule.expression(cadence).unwrap_or("not set")
        );
    }
    let _ = writeln!(out);

    let notify = &backup.notifications;
    let _ = writeln!(out, "Notifications (recorded only):");
    let _ = writeln!(out, "  Webhook:   {}", or_unset(&notify.webhook_url));
    let _ = writeln!(out, "  Email:     {}", or_unset(&notify.email));
    let _ = writeln!(out);

    let _ = write!(
        out,
        "Secrets: rotate every {} days",
        settings.secrets.rotation_max_age_days
    );
    out
}

pub fn handle_config_command(paths: &KeepsakePaths, settings: &Settings) {
    println!("{}", format_settings(paths, settings));
}
