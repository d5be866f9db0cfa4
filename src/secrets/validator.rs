//! Secret validation, generation and the production gate

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLogger};
use crate::config::env_file::{load_env_file, upsert_env_values};
use crate::config::{Environment, KeepsakePaths, SecretSettings};
use crate::error::{KeepsakeError, KeepsakeResult};

use super::generator::{generate_secrets, GenerateOptions};
use super::metadata::SecretMetadataStore;
use super::policy::{check_credential, check_secret, CREDENTIALS, REQUIRED_SECRETS, SECRET_MIN_LENGTH};

/// One report line, attributed to a secret or file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub subject: String,
    pub message: String,
}

impl Finding {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.message)
    }
}

/// Result of a validation run
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Any error makes the report invalid
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub recommendations: Vec<Finding>,
    pub checked_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of the production gate
#[derive(Debug, Clone, PartialEq)]
pub enum ProductionGate {
    /// Not a production environment; nothing was checked
    Skipped,
    Passed(ValidationReport),
    Blocked(ValidationReport),
}

impl ProductionGate {
    /// The report, if validation ran
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ProductionGate::Skipped => None,
            ProductionGate::Passed(report) | ProductionGate::Blocked(report) => Some(report),
        }
    }

    /// Turn a blocked gate into a [`KeepsakeError::SecretPolicy`] error
    pub fn enforce(self) -> KeepsakeResult<Option<ValidationReport>> {
        match self {
            ProductionGate::Skipped => Ok(None),
            ProductionGate::Passed(report) => Ok(Some(report)),
            ProductionGate::Blocked(report) => Err(KeepsakeError::SecretPolicy(format!(
                "{} secret error(s) block production use: {}",
                report.errors.len(),
                report
                    .errors
                    .iter()
                    .map(|f| f.subject.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Where secret values are read from
enum SecretSource {
    /// Process environment, then the project `.env` file
    Environment,
    /// Fixed values
    Values(BTreeMap<String, String>),
}

/// Enforces the secret policy and generates replacements
pub struct SecretValidator {
    paths: KeepsakePaths,
    environment: Environment,
    rotation_max_age_days: u32,
    source: SecretSource,
}

impl SecretValidator {
    pub fn new(paths: KeepsakePaths, environment: Environment, settings: &SecretSettings) -> Self {
        Self {
            paths,
            environment,
            rotation_max_age_days: settings.rotation_max_age_days,
            source: SecretSource::Environment,
        }
    }

    /// Read secret values from `values` instead of the environment
    pub fn with_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.source = SecretSource::Values(values);
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    fn metadata_store(&self) -> SecretMetadataStore {
        SecretMetadataStore::new(self.paths.secret_metadata_file())
    }

    fn audit_logger(&self) -> AuditLogger {
        AuditLogger::new(self.paths.secret_audit_log())
    }

    /// Values of the required secrets and credentials
    ///
    /// Process environment wins over the `.env` file. A `.env` file that
    /// cannot be read is reported and the process environment alone is used.
    fn current_values(&self, report: &mut ValidationReport) -> BTreeMap<String, String> {
        let names = REQUIRED_SECRETS
            .iter()
            .copied()
            .chain(CREDENTIALS.iter().map(|rule| rule.name));

        match &self.source {
            SecretSource::Values(values) => names
                .filter_map(|name| values.get(name).map(|v| (name.to_string(), v.clone())))
                .collect(),
            SecretSource::Environment => {
                let env_file = self.paths.env_file();
                let file_values = load_env_file(&env_file).unwrap_or_else(|e| {
                    warn!(error = %e, "Validating against the process environment only");
                    report.errors.push(Finding::new(
                        env_file.display().to_string(),
                        format!("could not be read: {}", e),
                    ));
                    BTreeMap::new()
                });
                names
                    .filter_map(|name| {
                        std::env::var(name)
                            .ok()
                            .or_else(|| file_values.get(name).cloned())
                            .map(|v| (name.to_string(), v))
                    })
                    .collect()
            }
        }
    }

    /// Check every required secret and datastore credential
    ///
    /// Policy failures are reported, not returned as errors. The run is
    /// recorded in the audit log.
    pub fn validate_all_secrets(&self) -> KeepsakeResult<ValidationReport> {
        let mut report = ValidationReport::new();
        let env_file = self.paths.env_file();

        if !env_file.exists() {
            report.errors.push(Finding::new(
                env_file.display().to_string(),
                "does not exist",
            ));
        }

        let values = self.current_values(&mut report);
        let metadata = self.metadata_store().load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable secret metadata");
            BTreeMap::new()
        });

        for name in REQUIRED_SECRETS {
            let Some(value) = values.get(name) else {
                report.errors.push(Finding::new(name, "is not set"));
                continue;
            };

            for issue in check_secret(value, SECRET_MIN_LENGTH) {
                let finding = Finding::new(name, issue.message.clone());
                if issue.is_error() {
                    report.errors.push(finding);
                } else {
                    report.warnings.push(finding);
                }
            }

            match metadata.get(name) {
                None => report.recommendations.push(Finding::new(
                    name,
                    "has no rotation metadata; regenerate it to start tracking its age",
                )),
                Some(record) if !record.matches(value) => report.recommendations.push(Finding::new(
                    name,
                    "was changed outside keepsake; its age is unknown, consider regenerating it",
                )),
                Some(record) => {
                    let age = record.age_days(report.checked_at);
                    if age > i64::from(self.rotation_max_age_days) {
                        report.recommendations.push(Finding::new(
                            name,
                            format!(
                                "is {} days old; rotate secrets every {} days",
                                age, self.rotation_max_age_days
                            ),
                        ));
                    }
                }
            }
        }

        for rule in CREDENTIALS {
            let Some(value) = values.get(rule.name) else {
                report.errors.push(Finding::new(rule.name, "is not set"));
                continue;
            };
            for issue in check_credential(value, &rule) {
                report.errors.push(Finding::new(rule.name, issue.message));
            }
        }

        info!(
            valid = report.is_valid(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            recommendations = report.recommendations.len(),
            "Secret validation finished"
        );

        if let Err(e) = self
            .audit_logger()
            .log(&AuditEntry::validation(&report, self.environment))
        {
            warn!(error = %e, "Failed to write secret audit entry");
        }

        Ok(report)
    }

    /// Generate fresh values and record their rotation metadata
    ///
    /// The values are returned, not written; see [`Self::write_env_file`].
    pub fn generate_secrets(&self, options: &GenerateOptions) -> KeepsakeResult<BTreeMap<String, String>> {
        let secrets = generate_secrets(options);
        self.metadata_store().record(&secrets, Utc::now())?;
        debug!(count = secrets.len(), "Generated secrets");

        if let Err(e) = self
            .audit_logger()
            .log(&AuditEntry::generation(secrets.keys().cloned(), self.environment))
        {
            warn!(error = %e, "Failed to write secret audit entry");
        }

        Ok(secrets)
    }

    /// Write secrets into the project `.env`, replacing existing keys
    pub fn write_env_file(&self, secrets: &BTreeMap<String, String>) -> KeepsakeResult<()> {
        let env_file = self.paths.env_file();
        upsert_env_values(&env_file, secrets)?;
        info!(path = %env_file.display(), count = secrets.len(), "Secrets written");
        Ok(())
    }

    /// Validate only in production
    pub fn validate_production(&self) -> KeepsakeResult<ProductionGate> {
        if !self.environment.is_production() {
            debug!(environment = %self.environment, "Skipping production secret check");
            return Ok(ProductionGate::Skipped);
        }

        let report = self.validate_all_secrets()?;
        Ok(if report.is_valid() {
            ProductionGate::Passed(report)
        } else {
            ProductionGate::Blocked(report)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::SecretAction;
    use crate::config::env_file::parse_env;
    use chrono::Duration;
    use std::fs;
    use tempfile::TempDir;

    fn validator(temp: &TempDir, environment: Environment) -> SecretValidator {
        SecretValidator::new(
            KeepsakePaths::with_project_root(temp.path().to_path_buf()),
            environment,
            &SecretSettings::default(),
        )
    }

    fn strong_values() -> BTreeMap<String, String> {
        generate_secrets(&GenerateOptions::default())
    }

    #[test]
    fn test_missing_env_file_and_values() {
        let temp = TempDir::new().unwrap();
        let validator = validator(&temp, Environment::Development).with_values(BTreeMap::new());

        let report = validator.validate_all_secrets().unwrap();

        assert!(!report.is_valid());
        assert!(report.errors[0].message.contains("does not exist"));
        assert_eq!(report.errors.len(), 1 + REQUIRED_SECRETS.len() + CREDENTIALS.len());
    }

    #[test]
    fn test_generated_secrets_validate() {
        let temp = TempDir::new().unwrap();
        let v = validator(&temp, Environment::Development);

        let secrets = v.generate_secrets(&GenerateOptions::default()).unwrap();
        v.write_env_file(&secrets).unwrap();

        let report = v.with_values(secrets).validate_all_secrets().unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_placeholders_and_weak_values_are_errors() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".env"), "").unwrap();
        let mut values = strong_values();
        values.insert("JWT_SECRET".to_string(), "REPLACE_WITH_xyz".to_string());
        values.insert("SESSION_SECRET".to_string(), "password".to_string());
        values.insert("DB_PASSWORD".to_string(), "short".to_string());

        let report = validator(&temp, Environment::Development)
            .with_values(values)
            .validate_all_secrets()
            .unwrap();

        let subjects: Vec<&str> = report.errors.iter().map(|f| f.subject.as_str()).collect();
        assert_eq!(subjects, vec!["JWT_SECRET", "SESSION_SECRET", "DB_PASSWORD"]);
    }

    #[test]
    fn test_rotation_recommendations() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".env"), "").unwrap();
        let values = strong_values();

        let store = SecretMetadataStore::new(temp.path().join(".secret-metadata.json"));
        let mut recorded = values.clone();
        recorded.remove("COOKIE_SECRET");
        recorded.insert("ENCRYPTION_KEY".to_string(), "an older value".to_string());
        store.record(&recorded, Utc::now()).unwrap();
        let mut old = BTreeMap::new();
        old.insert("JWT_SECRET".to_string(), values["JWT_SECRET"].clone());
        store.record(&old, Utc::now() - Duration::days(120)).unwrap();

        let report = validator(&temp, Environment::Development)
            .with_values(values)
            .validate_all_secrets()
            .unwrap();

        assert!(report.is_valid());
        let recommended: BTreeMap<&str, &str> = report
            .recommendations
            .iter()
            .map(|f| (f.subject.as_str(), f.message.as_str()))
            .collect();
        assert_eq!(recommended.len(), 3);
        assert!(recommended["JWT_SECRET"].starts_with("is 120 days old"));
        assert!(recommended["COOKIE_SECRET"].contains("no rotation metadata"));
        assert!(recommended["ENCRYPTION_KEY"].contains("changed outside"));
    }

    #[test]
    fn test_validation_is_audited() {
        let temp = TempDir::new().unwrap();
        let v = validator(&temp, Environment::Test).with_values(BTreeMap::new());

        v.validate_all_secrets().unwrap();
        v.validate_all_secrets().unwrap();

        let entries = AuditLogger::new(temp.path().join(".secret-audit.jsonl"))
            .read_all()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, SecretAction::Validate);
        assert_eq!(entries[0].valid, Some(false));
    }

    #[test]
    fn test_unreadable_env_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let env_file = temp.path().join(".env");
        fs::write(&env_file, b"JWT_SECRET=\xff\xfe\n").unwrap();
        let v = validator(&temp, Environment::Test);

        let report = v.validate_all_secrets().unwrap();

        assert!(!report.is_valid());
        assert_eq!(report.errors[0].subject, env_file.display().to_string());
        assert!(report.errors[0].message.starts_with("could not be read"));

        let entries = AuditLogger::new(temp.path().join(".secret-audit.jsonl"))
            .read_all()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].valid, Some(false));
    }

    #[test]
    fn test_write_env_file_keeps_other_keys() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".env"), "APP_ENV=production\nJWT_SECRET=old\n").unwrap();
        let v = validator(&temp, Environment::Production);

        let secrets = v.generate_secrets(&GenerateOptions::default()).unwrap();
        v.write_env_file(&secrets).unwrap();

        let parsed = parse_env(&fs::read_to_string(temp.path().join(".env")).unwrap());
        assert_eq!(parsed["APP_ENV"], "production");
        assert_eq!(parsed["JWT_SECRET"], secrets["JWT_SECRET"]);
        assert_eq!(parsed["REDIS_PASSWORD"], secrets["REDIS_PASSWORD"]);
    }

    #[test]
    fn test_production_gate() {
        let temp = TempDir::new().unwrap();

        let gate = validator(&temp, Environment::Development)
            .with_values(BTreeMap::new())
            .validate_production()
            .unwrap();
        assert_eq!(gate, ProductionGate::Skipped);
        assert!(gate.enforce().unwrap().is_none());

        let gate = validator(&temp, Environment::Production)
            .with_values(BTreeMap::new())
            .validate_production()
            .unwrap();
        assert!(matches!(gate, ProductionGate::Blocked(_)));
        let err = gate.enforce().unwrap_err();
        assert!(matches!(err, KeepsakeError::SecretPolicy(_)));

        fs::write(temp.path().join(".env"), "").unwrap();
        let gate = validator(&temp, Environment::Production)
            .with_values(strong_values())
            .validate_production()
            .unwrap();
        assert!(gate.enforce().unwrap().is_some());
    }
}
