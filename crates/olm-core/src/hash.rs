use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::OlmError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hash for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, OlmError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Returns the first `len` hex digits of [`stable_hash_string`].
pub fn short_hash_string<T: Serialize>(value: &T, len: usize) -> Result<String, OlmError> {
    let full = stable_hash_string(value)?;
    Ok(full[..len.min(full.len())].to_string())
}
