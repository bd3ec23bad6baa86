//! Deterministic hashing of canonical artifacts.
//!
//! - `snapshot_digest(..)` hashes the canonical JSON of a value (sorted keys,
//!   array order preserved). Two identical analytics results give the same digest;
//!   golden-snapshot tests rely on this.
//! - `sha256_hex(..)` hashes raw bytes; the CLI applies it to the bytes it just wrote.
//! Hex digests are lowercase.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical_json::to_canonical_bytes;
use crate::IoError;

/// SHA-256 over raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the canonical JSON of `value`.
pub fn snapshot_digest<T: Serialize + ?Sized>(value: &T) -> Result<String, IoError> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

/// First `n` hex chars of a digest, for log lines.
pub fn short(hex64: &str, n: usize) -> &str {
    &hex64[..n.min(hex64.len())]
}
