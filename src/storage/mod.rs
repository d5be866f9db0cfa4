//! Storage layer for Keepsake
//!
//! JSON and raw-byte file helpers with atomic writes, shared by backup
//! metadata, the secret metadata store and the environment file writer.

pub mod file_io;

pub use file_io::{read_json, read_json_required, write_bytes_atomic, write_json_atomic};
