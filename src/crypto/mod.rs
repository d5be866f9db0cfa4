//! Cryptographic functions for Keepsake
//!
//! Provides AES-256-GCM file encryption keyed by a SHA-256 digest of the
//! configured passphrase, plus zeroizing containers for secret material.

pub mod encryption;
pub mod key_derivation;
pub mod secure_memory;

pub use encryption::{decrypt, decrypt_file, encrypt, encrypt_file, IV_SIZE};
pub use key_derivation::{derive_key, fingerprint, DerivedKey};
pub use secure_memory::SecureString;
