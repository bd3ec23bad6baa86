//! cf_io — file boundary of the forecast engine.
//!
//! - Shared error type (`IoError`) with `From` conversions used across modules.
//! - `loader`: bounded read + typed parse of scenario documents.
//! - `canonical_json`: sorted-key compact JSON and atomic artifact writes.
//! - `hasher`: SHA-256 over raw bytes and over canonical JSON (snapshot digests).

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for cf_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON parse/serialize errors with a line/column hint when serde_json has one.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Input exceeded the configured size bound.
    #[error("limit exceeded: {0}")]
    Limit(String),
}

pub type IoResult<T> = Result<T, IoError>;

/* ---------------- From conversions (used by file modules) ---------------- */

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        let pointer = if e.line() == 0 { "/".to_string() } else { format!("line {} col {}", e.line(), e.column()) };
        IoError::Json { pointer, msg: e.to_string() }
    }
}

pub mod canonical_json;
pub mod hasher;
pub mod loader;

pub use canonical_json::{to_canonical_bytes, write_canonical_file};
pub use hasher::{sha256_hex, snapshot_digest};
pub use loader::{load_scenario, parse_scenario};
