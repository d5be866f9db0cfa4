//! Random secret generation
//!
//! Values come from the operating system RNG. The symbol set avoids quotes,
//! backslashes, `$`, `#` and angle brackets so a generated value survives a
//! quoted `.env` line and never looks like a placeholder.

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::Rng;

use super::policy::{check_secret, CREDENTIALS, REQUIRED_SECRETS, SECRET_MIN_LENGTH};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
/// Shell- and dotenv-safe punctuation
pub const SYMBOLS: &str = "!%^&*()-_=+[]{}:,.?~@";
/// Characters that are easy to confuse when read
pub const SIMILAR: &str = "0O1lI";

/// Draws before settling for a candidate that still trips a weak-pattern check
const MAX_ATTEMPTS: usize = 32;

/// How secrets are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    pub length: usize,
    pub include_symbols: bool,
    pub exclude_similar: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            length: SECRET_MIN_LENGTH,
            include_symbols: true,
            exclude_similar: true,
        }
    }
}

impl GenerateOptions {
    /// Options for a datastore password of `length`: alphanumeric only so it
    /// can be embedded in a connection URI unescaped
    pub fn credential(length: usize, exclude_similar: bool) -> Self {
        Self {
            length,
            include_symbols: false,
            exclude_similar,
        }
    }

    /// Characters a secret is drawn from
    pub fn alphabet(&self) -> Vec<char> {
        let mut chars: Vec<char> = LOWERCASE.chars().chain(UPPERCASE.chars()).chain(DIGITS.chars()).collect();
        if self.include_symbols {
            chars.extend(SYMBOLS.chars());
        }
        if self.exclude_similar {
            chars.retain(|c| !SIMILAR.contains(*c));
        }
        chars
    }
}

/// One random string drawn uniformly from the options' alphabet
pub fn generate_secret(options: &GenerateOptions) -> String {
    let alphabet = options.alphabet();
    let mut rng = OsRng;
    (0..options.length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// A random string that also passes the weak-pattern checks
pub fn generate_compliant_secret(options: &GenerateOptions) -> String {
    let mut candidate = generate_secret(options);
    for _ in 1..MAX_ATTEMPTS {
        let rejected = check_secret(&candidate, options.length.min(SECRET_MIN_LENGTH))
            .iter()
            .any(|issue| issue.is_error());
        if !rejected {
            break;
        }
        candidate = generate_secret(options);
    }
    candidate
}

/// Fresh values for every required secret and datastore credential
pub fn generate_secrets(options: &GenerateOptions) -> BTreeMap<String, String> {
    let mut secrets = BTreeMap::new();

    for name in REQUIRED_SECRETS {
        secrets.insert(name.to_string(), generate_compliant_secret(options));
    }
    for rule in CREDENTIALS {
        let credential = GenerateOptions::credential(rule.generated_length, options.exclude_similar);
        secrets.insert(rule.name.to_string(), generate_compliant_secret(&credential));
    }

    secrets
}
