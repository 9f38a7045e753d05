use farmer_pospace::{PlotVersion, PoolIdentity};

/// A proof of space as reported by a harvester.
///
/// Wire data can legally (if the harvester is misbehaving) contain zero or
/// two of `pool_public_key`/`pool_contract_puzzle_hash`; [`Self::pool_identity`]
/// is where that invariant is actually checked, since [`PoolIdentity`] itself
/// cannot represent "both" or "neither".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfSpace {
    pub challenge: [u8; 32],
    pub pool_public_key: Option<[u8; 48]>,
    pub pool_contract_puzzle_hash: Option<[u8; 32]>,
    pub plot_public_key: [u8; 48],
    pub version: u8,
    pub k_size: u8,
    pub proof: Vec<u8>,
}

/// A proof violates a structural consensus invariant -- not a signal that the
/// harvester is malicious, proofs legitimately fail these checks in normal
/// operation (e.g. when a filter simply doesn't pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolInvariantError {
    #[error("proof carries neither a pool public key nor a pool contract puzzle hash")]
    MissingPoolIdentity,
    #[error("proof carries both a pool public key and a pool contract puzzle hash")]
    AmbiguousPoolIdentity,
    #[error("unrecognized plot version tag {0}")]
    UnknownPlotVersion(u8),
}

impl ProofOfSpace {
    /// Validates the pool-identity exclusivity invariant (spec.md §8: "for all
    /// accepted `ProofOfSpace`, exactly one of `pool_public_key`,
    /// `pool_contract_puzzle_hash` is present").
    pub fn pool_identity(&self) -> Result<PoolIdentity, ProtocolInvariantError> {
        match (self.pool_public_key, self.pool_contract_puzzle_hash) {
            (Some(pk), None) => Ok(PoolIdentity::PublicKey(pk)),
            (None, Some(ph)) => Ok(PoolIdentity::ContractPuzzleHash(ph)),
            (None, None) => Err(ProtocolInvariantError::MissingPoolIdentity),
            (Some(_), Some(_)) => Err(ProtocolInvariantError::AmbiguousPoolIdentity),
        }
    }

    pub fn plot_version(&self) -> Result<PlotVersion, ProtocolInvariantError> {
        PlotVersion::decode(self.version, self.k_size)
            .ok_or(ProtocolInvariantError::UnknownPlotVersion(self.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ProofOfSpace {
        ProofOfSpace {
            challenge: [0u8; 32],
            pool_public_key: None,
            pool_contract_puzzle_hash: None,
            plot_public_key: [0u8; 48],
            version: 0,
            k_size: 32,
            proof: vec![],
        }
    }

    #[test]
    fn rejects_neither_pool_identity() {
        assert_eq!(
            base().pool_identity(),
            Err(ProtocolInvariantError::MissingPoolIdentity)
        );
    }

    #[test]
    fn rejects_both_pool_identities() {
        let mut pos = base();
        pos.pool_public_key = Some([1u8; 48]);
        pos.pool_contract_puzzle_hash = Some([2u8; 32]);
        assert_eq!(
            pos.pool_identity(),
            Err(ProtocolInvariantError::AmbiguousPoolIdentity)
        );
    }

    #[test]
    fn accepts_exactly_one_pool_identity() {
        let mut pos = base();
        pos.pool_public_key = Some([1u8; 48]);
        assert!(pos.pool_identity().is_ok());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut pos = base();
        pos.version = 9;
        assert_eq!(
            pos.plot_version(),
            Err(ProtocolInvariantError::UnknownPlotVersion(9))
        );
    }
}
