//! Tar/gzip packaging of backup directories
//!
//! Archives contain a single top-level directory named after the backup,
//! the same layout `tar -C <root> -czf <name>.tar.gz <name>` produces.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use crate::error::{KeepsakeError, KeepsakeResult};

/// Package `source_dir` into `archive_path`
///
/// `compression_level` of `None` writes a plain tar.
pub fn create_archive(
    source_dir: &Path,
    archive_path: &Path,
    compression_level: Option<u32>,
) -> KeepsakeResult<()> {
    let top_level = source_dir
        .file_name()
        .ok_or_else(|| KeepsakeError::Archive(format!("Invalid source {}", source_dir.display())))?;

    let file = File::create(archive_path).map_err(|e| {
        KeepsakeError::Archive(format!("Failed to create {}: {}", archive_path.display(), e))
    })?;
    let writer = BufWriter::new(file);

    let archive_err =
        |e: std::io::Error| KeepsakeError::Archive(format!("Failed to archive {}: {}", source_dir.display(), e));

    match compression_level {
        Some(level) => {
            let encoder = GzEncoder::new(writer, Compression::new(level.min(9)));
            let mut builder = Builder::new(encoder);
            builder.append_dir_all(top_level, source_dir).map_err(archive_err)?;
            let encoder = builder.into_inner().map_err(archive_err)?;
            let mut writer = encoder.finish().map_err(archive_err)?;
            writer.flush().map_err(archive_err)?;
        }
        None => {
            let mut builder = Builder::new(writer);
            builder.append_dir_all(top_level, source_dir).map_err(archive_err)?;
            let mut writer = builder.into_inner().map_err(archive_err)?;
            writer.flush().map_err(archive_err)?;
        }
    }

    Ok(())
}

/// Unpack an archive into `target_dir`
pub fn extract_archive(archive_path: &Path, target_dir: &Path, compressed: bool) -> KeepsakeResult<()> {
    let file = File::open(archive_path).map_err(|e| {
        KeepsakeError::Archive(format!("Failed to open {}: {}", archive_path.display(), e))
    })?;
    let reader = BufReader::new(file);

    let unpack_err =
        |e: std::io::Error| KeepsakeError::Archive(format!("Failed to extract {}: {}", archive_path.display(), e));

    if compressed {
        Archive::new(GzDecoder::new(reader))
            .unpack(target_dir)
            .map_err(unpack_err)
    } else {
        Archive::new(reader).unpack(target_dir).map_err(unpack_err)
    }
}
