//! Content hashing
//!
//! Certificates are identified on-chain by the SHA-256 of their file bytes,
//! rendered as 64 lowercase hex characters without a `0x` prefix.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Placeholder proof string for a certificate id
///
/// Not a real proof system: the value is just the hash of `"{id}_proof"`.
pub fn mock_proof(certificate_id: &str) -> String {
    sha256_hex(format!("{certificate_id}_proof").as_bytes())
}
