// Content fingerprinting for deduplication.
//
// Text is hashed over its raw UTF-8 bytes and images over their encoded
// (base64) form. Both kinds share one fingerprint space, so a text whose bytes
// equal an image's encoding maps to the same request.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the content. No normalization is applied.
pub fn fingerprint(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    hex::encode(hasher.finalize())
}
