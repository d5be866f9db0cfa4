//! Backup identifier generation

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Process-wide sequence; keeps ids distinct within one millisecond
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

const SUFFIX_LEN: usize = 6;

/// Generate a backup id: `<yyyymmdd-hhmmss-mmm>-<seq>-<random>`
///
/// The timestamp prefix makes ids sort chronologically, the sequence makes
/// them unique inside this process and the random suffix separates ids
/// produced by different processes in the same millisecond.
pub fn generate_backup_id(now: DateTime<Utc>) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{}-{:04}-{}", now.format("%Y%m%d-%H%M%S-%3f"), seq, suffix)
}
