//! Content hashing for duplicate detection
//!
//! The dedup hash is a CRC32C over the JSON serialization of a version's
//! `data` and `meta` blocks, encoded as base64 of the big-endian checksum.
//! Field order is preserved during serialization, so two payloads with the
//! same fields in a different order hash differently.

use crate::error::Result;
use crate::types::RecordData;
use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Compute the dedup hash of a record payload
///
/// # Errors
/// Returns `Error::Serialization` if the payload cannot be serialized.
pub fn record_hash(data: &RecordData) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    Ok(hash_bytes(&bytes))
}

/// Dedup hash of an already-serialized payload
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(crc32c::crc32c(bytes).to_be_bytes())
}
