//! Audit entry data structures
//!
//! One entry per secret validation or generation run. Entries name the
//! secrets involved but never carry their values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Environment;
use crate::secrets::ValidationReport;

/// What the run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretAction {
    /// Secrets were checked against the policy
    Validate,
    /// New secrets were generated
    Generate,
}

impl std::fmt::Display for SecretAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretAction::Validate => write!(f, "VALIDATE"),
            SecretAction::Generate => write!(f, "GENERATE"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique id of the run
    pub run_id: Uuid,

    /// When the run happened (UTC)
    pub timestamp: DateTime<Utc>,

    pub action: SecretAction,

    /// Environment the run was made in
    pub environment: Environment,

    /// Validation outcome; absent for generation runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,

    #[serde(default)]
    pub errors: usize,

    #[serde(default)]
    pub warnings: usize,

    #[serde(default)]
    pub recommendations: usize,

    /// Secrets with errors (validation) or that were generated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
}

impl AuditEntry {
    /// Entry for a validation run
    pub fn validation(report: &ValidationReport, environment: Environment) -> Self {
        let mut secrets: Vec<String> = report.errors.iter().map(|f| f.subject.clone()).collect();
        secrets.dedup();

        Self {
            run_id: Uuid::new_v4(),
            timestamp: report.checked_at,
            action: SecretAction::Validate,
            environment,
            valid: Some(report.is_valid()),
            errors: report.errors.len(),
            warnings: report.warnings.len(),
            recommendations: report.recommendations.len(),
            secrets,
        }
    }

    /// Entry for a generation run
    pub fn generation<I, S>(names: I, environment: Environment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action: SecretAction::Generate,
            environment,
            valid: None,
            errors: 0,
            warnings: 0,
            recommendations: 0,
            secrets: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} ({})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.action,
            self.environment
        );

        match self.action {
            SecretAction::Validate => output.push_str(&format!(
                " {}: {} errors, {} warnings, {} recommendations",
                if self.valid == Some(true) { "valid" } else { "invalid" },
                self.errors,
                self.warnings,
                self.recommendations
            )),
            SecretAction::Generate => {
                output.push_str(&format!(" {} secrets", self.secrets.len()));
            }
        }

        if !self.secrets.is_empty() {
            output.push_str(&format!("\n  Secrets: {}", self.secrets.join(", ")));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::Finding;

    fn report() -> ValidationReport {
        let mut report = ValidationReport::new();
        report.errors.push(Finding::new("JWT_SECRET", "is missing"));
        report.errors.push(Finding::new("JWT_SECRET", "is too short"));
        report.warnings.push(Finding::new("SESSION_SECRET", "has low entropy"));
        report
    }

    #[test]
    fn test_action_display() {
        assert_eq!(SecretAction::Validate.to_string(), "VALIDATE");
        assert_eq!(SecretAction::Generate.to_string(), "GENERATE");
    }

    #[test]
    fn test_validation_entry() {
        let entry = AuditEntry::validation(&report(), Environment::Production);

        assert_eq!(entry.action, SecretAction::Validate);
        assert_eq!(entry.valid, Some(false));
        assert_eq!(entry.errors, 2);
        assert_eq!(entry.warnings, 1);
        assert_eq!(entry.secrets, vec!["JWT_SECRET"]);
    }

    #[test]
    fn test_generation_entry_json_has_no_values() {
        let entry = AuditEntry::generation(["JWT_SECRET", "DB_PASSWORD"], Environment::Development);

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"action\":\"generate\""));
        assert!(json.contains("DB_PASSWORD"));
        assert!(!json.contains("\"valid\""));
    }

    #[test]
    fn test_format_human_readable() {
        let entry = AuditEntry::validation(&report(), Environment::Production);
        let formatted = entry.format_human_readable();

        assert!(formatted.contains("VALIDATE (production)"));
        assert!(formatted.contains("invalid: 2 errors, 1 warnings, 0 recommendations"));
        assert!(formatted.contains("Secrets: JWT_SECRET"));
    }
}
