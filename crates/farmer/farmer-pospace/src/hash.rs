use sha2::{Digest, Sha256};

/// The canonical 32-byte hash used throughout consensus: `SHA256`.
#[must_use]
pub fn std_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
