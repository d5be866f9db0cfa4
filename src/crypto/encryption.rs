//! AES-256-GCM encryption/decryption of backup artifacts
//!
//! Encrypted file layout: the first 16 bytes are the random IV, the
//! remainder is a sequence of 64 KiB plaintext chunks, each sealed with its
//! own 16-byte authentication tag (the STREAM construction, big-endian
//! 32-bit counter). The final chunk is marked, so truncation and reordering
//! are detected. A fresh IV is generated for every file.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use aes_gcm::aead::consts::U21;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::stream::{DecryptorBE32, EncryptorBE32};
use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;

use crate::error::{KeepsakeError, KeepsakeResult};

use super::DerivedKey;

/// Size of the IV prefixed to every encrypted file
pub const IV_SIZE: usize = 16;

/// Plaintext bytes sealed per chunk
const CHUNK_SIZE: usize = 64 * 1024;

const TAG_SIZE: usize = 16;

/// AES-256-GCM with a 21-byte nonce: the 16-byte IV plus the 5 bytes the
/// STREAM counter and last-chunk flag occupy
type BackupCipher = AesGcm<Aes256, U21>;

fn cipher_for(key: &DerivedKey) -> KeepsakeResult<BackupCipher> {
    BackupCipher::new_from_slice(key.as_bytes())
        .map_err(|e| KeepsakeError::Encryption(format!("Failed to create cipher: {}", e)))
}

fn encryption_failed(e: aes_gcm::aead::Error) -> KeepsakeError {
    KeepsakeError::Encryption(format!("Encryption failed: {}", e))
}

fn decryption_failed(_: aes_gcm::aead::Error) -> KeepsakeError {
    KeepsakeError::Encryption("Decryption failed: invalid key or corrupted data".to_string())
}

/// Read up to `size` bytes; fewer only at end of input
fn read_chunk<R: Read>(reader: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(size);
    reader.by_ref().take(size as u64).read_to_end(&mut chunk)?;
    Ok(chunk)
}

/// Read the next full chunk, or return `None` when `chunk` is the last one
fn next_chunk<R: Read>(reader: &mut R, chunk: &[u8], size: usize) -> io::Result<Option<Vec<u8>>> {
    if chunk.len() < size {
        return Ok(None);
    }
    let next = read_chunk(reader, size)?;
    Ok((!next.is_empty()).then_some(next))
}

/// Encrypt everything from `reader` into `writer` as `IV || sealed chunks`
pub fn encrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    key: &DerivedKey,
) -> KeepsakeResult<()> {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut encryptor = EncryptorBE32::from_aead(cipher_for(key)?, GenericArray::from_slice(&iv));
    writer.write_all(&iv)?;

    let mut chunk = read_chunk(&mut reader, CHUNK_SIZE)?;
    let last = loop {
        match next_chunk(&mut reader, &chunk, CHUNK_SIZE)? {
            None => break chunk,
            Some(next) => {
                let sealed = encryptor
                    .encrypt_next(chunk.as_slice())
                    .map_err(encryption_failed)?;
                writer.write_all(&sealed)?;
                chunk = next;
            }
        }
    };

    let sealed = encryptor
        .encrypt_last(last.as_slice())
        .map_err(encryption_failed)?;
    writer.write_all(&sealed)?;
    writer.flush()?;
    Ok(())
}

/// Decrypt `IV || sealed chunks` from `reader` into `writer`
///
/// Plaintext is written chunk by chunk as each one authenticates, so a
/// failure can leave a partial prefix in `writer`.
pub fn decrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    key: &DerivedKey,
) -> KeepsakeResult<()> {
    let iv = read_chunk(&mut reader, IV_SIZE)?;
    if iv.len() < IV_SIZE {
        return Err(KeepsakeError::Encryption(format!(
            "Encrypted data too short: expected at least {} bytes, got {}",
            IV_SIZE,
            iv.len()
        )));
    }

    let mut decryptor = DecryptorBE32::from_aead(cipher_for(key)?, GenericArray::from_slice(&iv));

    let sealed_size = CHUNK_SIZE + TAG_SIZE;
    let mut chunk = read_chunk(&mut reader, sealed_size)?;
    let last = loop {
        match next_chunk(&mut reader, &chunk, sealed_size)? {
            None => break chunk,
            Some(next) => {
                let plain = decryptor
                    .decrypt_next(chunk.as_slice())
                    .map_err(decryption_failed)?;
                writer.write_all(&plain)?;
                chunk = next;
            }
        }
    };

    let plain = decryptor
        .decrypt_last(last.as_slice())
        .map_err(decryption_failed)?;
    writer.write_all(&plain)?;
    writer.flush()?;
    Ok(())
}

/// Encrypt plaintext, returning `IV || sealed chunks`
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> KeepsakeResult<Vec<u8>> {
    let chunks = plaintext.len() / CHUNK_SIZE + 1;
    let mut out = Vec::with_capacity(IV_SIZE + plaintext.len() + chunks * TAG_SIZE);
    encrypt_stream(plaintext, &mut out, key)?;
    Ok(out)
}

/// Decrypt `IV || sealed chunks`
pub fn decrypt(data: &[u8], key: &DerivedKey) -> KeepsakeResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    decrypt_stream(data, &mut out, key)?;
    Ok(out)
}

fn open_source(source: &Path) -> KeepsakeResult<BufReader<File>> {
    File::open(source)
        .map(BufReader::new)
        .map_err(|e| KeepsakeError::Encryption(format!("Failed to read {}: {}", source.display(), e)))
}

fn create_destination(destination: &Path) -> KeepsakeResult<BufWriter<File>> {
    File::create(destination).map(BufWriter::new).map_err(|e| {
        KeepsakeError::Encryption(format!("Failed to write {}: {}", destination.display(), e))
    })
}

/// Run a streaming transform from `source` to `destination`, removing the
/// destination if it fails
fn transform_file(
    source: &Path,
    destination: &Path,
    transform: impl FnOnce(BufReader<File>, BufWriter<File>) -> KeepsakeResult<()>,
) -> KeepsakeResult<()> {
    let reader = open_source(source)?;
    let writer = create_destination(destination)?;

    transform(reader, writer).map_err(|e| {
        let _ = fs::remove_file(destination);
        e
    })
}

/// Encrypt the file at `source` into `destination`
pub fn encrypt_file(source: &Path, destination: &Path, key: &DerivedKey) -> KeepsakeResult<()> {
    transform_file(source, destination, |reader, writer| {
        encrypt_stream(reader, writer, key)
    })
}

/// Decrypt the file at `source` into `destination`
///
/// On failure no partial plaintext is left at `destination`.
pub fn decrypt_file(source: &Path, destination: &Path, key: &DerivedKey) -> KeepsakeResult<()> {
    transform_file(source, destination, |reader, writer| {
        decrypt_stream(reader, writer, key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_derivation::derive_key;
    use tempfile::TempDir;

    fn test_key() -> DerivedKey {
        derive_key("test_passphrase").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = test_key();
        let plaintext = b"mongodump archive bytes";

        let encrypted = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&encrypted, &key).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn test_iv_prefix_layout() {
        let key = test_key();
        let plaintext = b"0123456789";

        let encrypted = encrypt(plaintext, &key).unwrap();
        // IV + ciphertext + 16 byte tag
        assert_eq!(encrypted.len(), IV_SIZE + plaintext.len() + 16);
    }

    #[test]
    fn test_different_ivs() {
        let key = test_key();
        let plaintext = b"Hello, World!";

        let encrypted1 = encrypt(plaintext, &key).unwrap();
        let encrypted2 = encrypt(plaintext, &key).unwrap();

        assert_ne!(encrypted1[..IV_SIZE], encrypted2[..IV_SIZE]);
        assert_ne!(encrypted1, encrypted2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt(b"Hello, World!", &test_key()).unwrap();
        let other = derive_key("different_passphrase").unwrap();

        assert!(decrypt(&encrypted, &other).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key();
        let mut encrypted = encrypt(b"Hello, World!", &key).unwrap();
        encrypted[IV_SIZE] ^= 0xFF;

        assert!(decrypt(&encrypted, &key).is_err());
    }

    #[test]
    fn test_truncated_input_fails() {
        let key = test_key();
        let err = decrypt(&[0u8; 4], &key).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_file_round_trip_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("full-1.tar.gz");
        let encrypted = temp_dir.path().join("full-1.tar.gz.enc");
        let restored = temp_dir.path().join("restored.tar.gz");

        let payload: Vec<u8> = (0..10000).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &payload).unwrap();

        let key = test_key();
        encrypt_file(&source, &encrypted, &key).unwrap();
        decrypt_file(&encrypted, &restored, &key).unwrap();

        assert_eq!(fs::read(&restored).unwrap(), payload);
        assert_ne!(fs::read(&encrypted).unwrap()[IV_SIZE..IV_SIZE + 100], payload[..100]);
    }

    #[test]
    fn test_multi_chunk_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let key = test_key();

        for len in [3 * CHUNK_SIZE + 123, 2 * CHUNK_SIZE, 0] {
            let source = temp_dir.path().join(format!("full-{}.tar", len));
            let encrypted = temp_dir.path().join(format!("full-{}.tar.enc", len));
            let restored = temp_dir.path().join(format!("restored-{}.tar", len));

            let payload: Vec<u8> = (0..len).map(|i| (i % 241) as u8).collect();
            fs::write(&source, &payload).unwrap();

            encrypt_file(&source, &encrypted, &key).unwrap();
            decrypt_file(&encrypted, &restored, &key).unwrap();

            let chunks = len.div_ceil(CHUNK_SIZE).max(1);
            assert_eq!(
                fs::metadata(&encrypted).unwrap().len() as usize,
                IV_SIZE + len + chunks * TAG_SIZE
            );
            assert_eq!(fs::read(&restored).unwrap(), payload);
        }
    }

    #[test]
    fn test_dropped_final_chunk_fails() {
        let key = test_key();
        let payload = vec![7u8; 2 * CHUNK_SIZE + 5];

        let mut encrypted = encrypt(&payload, &key).unwrap();
        encrypted.truncate(IV_SIZE + 2 * (CHUNK_SIZE + TAG_SIZE));

        assert!(decrypt(&encrypted, &key).is_err());
    }

    #[test]
    fn test_failed_decrypt_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("full-1.tar");
        let encrypted = temp_dir.path().join("full-1.tar.enc");
        let restored = temp_dir.path().join("restored.tar");

        fs::write(&source, vec![1u8; CHUNK_SIZE + 10]).unwrap();
        encrypt_file(&source, &encrypted, &test_key()).unwrap();

        let other = derive_key("different_passphrase").unwrap();
        assert!(decrypt_file(&encrypted, &restored, &other).is_err());
        assert!(!restored.exists());
    }
}
