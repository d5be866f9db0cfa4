//! Secret strength rules
//!
//! Pure checks over a single value. Placeholders, short values and weak
//! patterns are errors; low entropy is only a warning.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Secrets every deployment must define
pub const REQUIRED_SECRETS: [&str; 5] = [
    "JWT_SECRET",
    "JWT_REFRESH_SECRET",
    "SESSION_SECRET",
    "COOKIE_SECRET",
    "ENCRYPTION_KEY",
];

/// Minimum length of a required secret
pub const SECRET_MIN_LENGTH: usize = 64;

/// Shannon entropy (bits per character) below which a secret draws a warning
pub const ENTROPY_WARNING_THRESHOLD: f64 = 4.5;

/// Identical characters in a row that count as a weak pattern
const REPEATED_RUN: usize = 4;

/// A datastore credential with its own length floor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialRule {
    pub name: &'static str,
    pub min_length: usize,
    /// Length used when generating a replacement
    pub generated_length: usize,
}

pub const DATABASE_PASSWORD: CredentialRule = CredentialRule {
    name: "DB_PASSWORD",
    min_length: 16,
    generated_length: 32,
};

pub const CACHE_PASSWORD: CredentialRule = CredentialRule {
    name: "REDIS_PASSWORD",
    min_length: 32,
    generated_length: 48,
};

pub const CREDENTIALS: [CredentialRule; 2] = [DATABASE_PASSWORD, CACHE_PASSWORD];

const PLACEHOLDER_PATTERNS: &[&str] = &[
    r"(?i)^(replace|change)[_\- ]?(with|me|this)",
    r"(?i)your[_\- ]?(secret|key|password|token)",
    r"(?i)^(changeme|secret|password|example|placeholder|default|todo|tbd|null|none|test)$",
    r"(?i)(^|[_\-])example([_\-]|$)",
    r"(?i)^(dev|development|test|local)[_\-]?(secret|key|password)",
    r"^x{3,}$|^X{3,}$|^\*+$",
    r"<[^>]+>",
    r"^\$\{[^}]*\}$",
];

const WEAK_SEQUENCES: &[&str] = &[
    "password", "123456", "654321", "qwerty", "abcdef", "admin", "letmein", "welcome", "iloveyou",
];

fn placeholder_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PLACEHOLDER_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Outcome class of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One problem with a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Whether a value looks like an unset default or example
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    placeholder_patterns().iter().any(|re| re.is_match(value))
}

/// Whether `value` contains `run` or more identical characters in a row
pub fn has_repeated_run(value: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;
    for c in value.chars() {
        if Some(c) == previous {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}

/// Description of the first weak pattern found in `value`
pub fn weak_pattern(value: &str) -> Option<String> {
    if has_repeated_run(value, REPEATED_RUN) {
        return Some(format!("{} or more repeated characters", REPEATED_RUN));
    }

    let lower = value.to_lowercase();
    WEAK_SEQUENCES
        .iter()
        .find(|seq| lower.contains(*seq))
        .map(|seq| format!("common sequence '{}'", seq))
}

/// Shannon entropy in bits per character
pub fn shannon_entropy(value: &str) -> f64 {
    let total = value.chars().count();
    if total == 0 {
        return 0.0;
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in value.chars() {
        *counts.entry(c).or_default() += 1;
    }

    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Full policy for a required secret
///
/// A placeholder is reported on its own; the remaining checks only make
/// sense for a real value.
pub fn check_secret(value: &str, min_length: usize) -> Vec<Issue> {
    if value.is_empty() {
        return vec![Issue::error("is empty")];
    }
    if is_placeholder(value) {
        return vec![Issue::error("contains a placeholder value")];
    }

    let mut issues = Vec::new();
    let length = value.chars().count();
    if length < min_length {
        issues.push(Issue::error(format!(
            "is too short ({} characters, minimum {})",
            length, min_length
        )));
    }
    if let Some(pattern) = weak_pattern(value) {
        issues.push(Issue::error(format!("contains a weak pattern: {}", pattern)));
    }

    let entropy = shannon_entropy(value);
    if entropy < ENTROPY_WARNING_THRESHOLD {
        issues.push(Issue::warning(format!(
            "has low entropy ({:.2} bits/char, recommended {})",
            entropy, ENTROPY_WARNING_THRESHOLD
        )));
    }

    issues
}

/// Policy for a datastore credential: placeholder and length only
pub fn check_credential(value: &str, rule: &CredentialRule) -> Vec<Issue> {
    if value.is_empty() {
        return vec![Issue::error("is empty")];
    }
    if is_placeholder(value) {
        return vec![Issue::error("contains a placeholder value")];
    }

    let length = value.chars().count();
    if length < rule.min_length {
        return vec![Issue::error(format!(
            "is too short ({} characters, minimum {})",
            length, rule.min_length
        ))];
    }
    Vec::new()
}
