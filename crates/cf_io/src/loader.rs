//! Loader: read a local scenario JSON document with a size bound and parse it into
//! the typed `Scenario`. Domain checks happen later in `cf_pipeline::validate`;
//! this layer only rejects unreadable, oversized or malformed documents.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use cf_core::variables::Scenario;

use crate::IoError;

/// Upper bound on scenario file size.
pub const MAX_SCENARIO_BYTES: u64 = 4 * 1024 * 1024;

pub fn load_scenario(path: &Path) -> Result<Scenario, IoError> {
    let bytes = read_bounded(path, MAX_SCENARIO_BYTES)?;
    let s = parse_scenario(&bytes)?;
    debug!(path = %path.display(), tactics = s.tactics.len(), "scenario loaded");
    Ok(s)
}

pub fn parse_scenario(bytes: &[u8]) -> Result<Scenario, IoError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read at most `limit` bytes; one byte more is an error rather than a silent truncation.
fn read_bounded(path: &Path, limit: u64) -> Result<Vec<u8>, IoError> {
    let f = File::open(path).map_err(|e| IoError::Path(format!("{}: {e}", path.display())))?;
    let mut buf = Vec::new();
    f.take(limit + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > limit {
        return Err(IoError::Limit(format!("{} exceeds {limit} bytes", path.display())));
    }
    Ok(buf)
}
