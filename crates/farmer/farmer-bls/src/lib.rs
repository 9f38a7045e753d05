//! BLS12-381 keys and the Augmented signature scheme, as used throughout the
//! pool protocol and harvester handshake.
//!
//! Built entirely on `blst`'s safe `min_pk` module -- including its built-in
//! EIP-2333 derivation -- so none of this crate needs `unsafe`.

mod derive;
mod error;

pub use derive::{
    master_sk_to_farmer_sk, master_sk_to_pool_sk, master_sk_to_pooling_authentication_sk,
};
pub use error::Error;

use blst::min_pk;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The domain separation tag for Chia's "Augmented" BLS scheme: the signer's
/// public key is prepended to the message before hashing to the curve.
const AUG_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_AUG_";

/// A BLS12-381 secret scalar (G1 side). Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(#[zeroize(skip)] min_pk::SecretKey);

impl SecretKey {
    /// Derives a master secret key from a seed, per EIP-2333.
    #[must_use]
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(min_pk::SecretKey::derive_master_eip2333(seed))
    }

    /// Hardened child derivation, per EIP-2333.
    #[must_use]
    pub fn derive_hardened(&self, index: u32) -> Self {
        Self(self.0.derive_child_eip2333(index))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.sk_to_pk())
    }

    /// Signs `msg` under the Augmented scheme (public key prepended before
    /// hash-to-curve).
    #[must_use]
    pub fn sign(&self, msg: &[u8]) -> Signature {
        let pk_bytes = self.0.sk_to_pk().to_bytes();
        Signature(self.0.sign(msg, AUG_DST, &pk_bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, Error> {
        min_pk::SecretKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for SecretKey {}

/// A BLS12-381 public key (G1).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(min_pk::PublicKey);

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.compress()
    }

    pub fn from_bytes(bytes: &[u8; 48]) -> Result<Self, Error> {
        min_pk::PublicKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidPublicKey)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// A BLS12-381 signature (G2).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(min_pk::Signature);

impl Signature {
    pub fn to_bytes(&self) -> [u8; 96] {
        self.0.compress()
    }

    pub fn from_bytes(bytes: &[u8; 96]) -> Result<Self, Error> {
        min_pk::Signature::from_bytes(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.to_bytes()))
    }
}

/// Verifies `sig` over `msg` under `pk`, Augmented scheme.
#[must_use]
pub fn verify(sig: &Signature, pk: &PublicKey, msg: &[u8]) -> bool {
    let pk_bytes = pk.0.compress();
    sig.0.verify(true, msg, AUG_DST, &pk_bytes, &pk.0, true) == blst::BLST_ERROR::BLST_SUCCESS
}

/// Aggregates signatures produced over distinct (pk, msg) pairs and verifies
/// the aggregate in one pairing check.
#[must_use]
pub fn aggregate_verify<'a, I>(pairs: I, sigs: &[Signature]) -> bool
where
    I: IntoIterator<Item = (&'a PublicKey, &'a [u8])>,
{
    let pairs: Vec<_> = pairs.into_iter().collect();
    if pairs.len() != sigs.len() || pairs.is_empty() {
        return false;
    }

    let Ok(agg_sig) = min_pk::AggregateSignature::aggregate(
        &sigs.iter().map(|s| &s.0).collect::<Vec<_>>(),
        true,
    ) else {
        return false;
    };
    let agg_sig = agg_sig.to_signature();

    let pks: Vec<&min_pk::PublicKey> = pairs.iter().map(|(pk, _)| &pk.0).collect();
    let pk_bytes: Vec<Vec<u8>> = pairs.iter().map(|(pk, _)| pk.0.compress().to_vec()).collect();
    let augs: Vec<&[u8]> = pk_bytes.iter().map(Vec::as_slice).collect();
    let msgs: Vec<&[u8]> = pairs.iter().map(|(_, msg)| *msg).collect();

    agg_sig.aggregate_verify(true, &msgs, AUG_DST, &pks, &augs, true)
        == blst::BLST_ERROR::BLST_SUCCESS
}
