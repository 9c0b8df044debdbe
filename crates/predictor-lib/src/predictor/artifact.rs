//! Model artifact loading with checksum validation

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Read a model artifact, validating its checksum when one is expected
pub fn read_artifact(path: &Path, expected_sha256: Option<&str>) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read model artifact {:?}", path))?;

    let checksum = compute_checksum(&bytes);
    if let Some(expected) = expected_sha256 {
        if !checksum.eq_ignore_ascii_case(expected.trim()) {
            anyhow::bail!(
                "Checksum mismatch for {:?}: expected {}, got {}",
                path,
                expected,
                checksum
            );
        }
        info!(path = ?path, checksum = %checksum, "Model checksum validated");
    }

    Ok(bytes)
}
