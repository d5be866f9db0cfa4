//! Secret lifecycle
//!
//! Validation of the application's signing and encryption secrets,
//! generation of replacements, rotation tracking and the production gate.
//! Every validation and generation run is appended to the secret audit log.

mod generator;
mod metadata;
mod policy;
mod validator;

pub use generator::{generate_compliant_secret, generate_secret, generate_secrets, GenerateOptions};
pub use metadata::{SecretMetadataStore, SecretRecord};
pub use policy::{
    check_credential, check_secret, is_placeholder, shannon_entropy, weak_pattern, CredentialRule,
    Issue, Severity, CREDENTIALS, ENTROPY_WARNING_THRESHOLD, REQUIRED_SECRETS, SECRET_MIN_LENGTH,
};
pub use validator::{Finding, ProductionGate, SecretValidator, ValidationReport};
