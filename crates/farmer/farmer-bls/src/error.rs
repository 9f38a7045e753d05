/// Errors from decoding untrusted BLS key/signature bytes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
}
