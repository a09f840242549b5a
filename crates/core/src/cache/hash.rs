//! Content-addressed validator generation.

use sha2::{Digest, Sha256};

/// Compute the entity validator (ETag token) for a serialized catalog body.
///
/// Two bodies share a validator only when they are byte-identical.
pub fn compute_validator(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}
