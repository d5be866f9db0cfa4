//! Key derivation for backup encryption
//!
//! The file key is the SHA-256 digest of the configured passphrase, so any
//! host holding the same `BACKUP_ENCRYPTION_KEY` can decrypt a backup
//! without extra salt or parameter files travelling with the artifact.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeepsakeError, KeepsakeResult};

/// A derived encryption key
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    /// The 32-byte key for AES-256
    key: [u8; 32],
}

impl DerivedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Derive an encryption key from a passphrase
pub fn derive_key(passphrase: &str) -> KeepsakeResult<DerivedKey> {
    if passphrase.is_empty() {
        return Err(KeepsakeError::Encryption(
            "Encryption passphrase must not be empty".to_string(),
        ));
    }

    let digest = Sha256::digest(passphrase.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);

    Ok(DerivedKey { key })
}

/// Truncated hex SHA-256 fingerprint of a value
///
/// Used where a value must be recognisable later without being stored.
pub fn fingerprint(value: &str, hex_chars: usize) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(hex_chars);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key() {
        let key = derive_key("test_passphrase").unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }

    #[test]
    fn test_same_passphrase_same_key() {
        let key1 = derive_key("test_passphrase").unwrap();
        let key2 = derive_key("test_passphrase").unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_passphrase_different_key() {
        let key1 = derive_key("passphrase1").unwrap();
        let key2 = derive_key("passphrase2").unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(derive_key("").is_err());
    }

    #[test]
    fn test_fingerprint() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(fingerprint("abc", 16), "ba7816bf8f01cfea");
        assert_eq!(fingerprint("abc", 8).len(), 8);
    }
}
