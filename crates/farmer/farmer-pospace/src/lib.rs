//! Proof-of-space primitives shared by the farmer core.
//!
//! Every derivation in this crate must match consensus bit-for-bit: a wrong
//! plot filter, challenge or quality string produces an invalid block further
//! up the pipeline. Nothing here touches plot files directly -- the
//! table-specific quality string decoding (chiapos v1/v2) is delegated to a
//! [`ProofVerifier`] implementation supplied by the caller, the same way
//! `chia-consensus` leaves `validate_proof` to the external `chiapos` crate.

mod consensus_constants;
mod hash;
mod quality;
mod required_iters;

pub use consensus_constants::ConsensusConstants;
pub use hash::std_hash;
pub use quality::{ProofVerifier, VerifiedProof};
pub use required_iters::{
    calculate_ip_iters, calculate_iterations_quality, calculate_sp_interval_iters,
    calculate_sp_iters, expected_plot_size, is_overflow_block, RequiredItersError,
};

/// A plot can encode proof-of-space in one of two on-disk table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotVersion {
    /// Original chiapos table format, parameterized by `k` in `[MIN_PLOT_SIZE, MAX_PLOT_SIZE]`.
    V1 { k_size: u8 },
    /// Compressed v2 table format, restricted to `k` in `{28, 30, 32}`.
    V2 { k_size: u8 },
}

impl PlotVersion {
    /// Decodes the wire-level `version_and_size` byte pair used by
    /// [`crate::quality::verify_and_get_quality_string`]'s caller.
    ///
    /// Returns `None` if the version tag is unrecognized.
    #[must_use]
    pub fn decode(version: u8, k_size: u8) -> Option<Self> {
        match version {
            0 => Some(PlotVersion::V1 { k_size }),
            1 => Some(PlotVersion::V2 { k_size }),
            _ => None,
        }
    }

    /// Whether `k_size` is within the bounds allowed for this plot version.
    #[must_use]
    pub fn k_size_is_valid(self, constants: &ConsensusConstants) -> bool {
        match self {
            PlotVersion::V1 { k_size } => {
                k_size >= constants.min_plot_size && k_size <= constants.max_plot_size
            }
            PlotVersion::V2 { k_size } => matches!(k_size, 28 | 30 | 32),
        }
    }
}

/// Identity of a plot's pool assignment: exactly one of a pool public key or a
/// pool contract puzzle hash, never both, never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolIdentity {
    /// Original pooling protocol: plot rewards go directly to a pool public key.
    PublicKey([u8; 48]),
    /// OG/NFT pooling protocol: plot rewards flow through a p2-singleton puzzle hash.
    ContractPuzzleHash([u8; 32]),
}

/// `plot_id = H(pool_identity_bytes ∥ plot_public_key)`.
///
/// `pool_identity_bytes` is the pool public key (48 bytes) when pooling by
/// key, or the pool contract puzzle hash (32 bytes) when pooling by puzzle
/// hash.
#[must_use]
pub fn calculate_plot_id(pool_identity: PoolIdentity, plot_public_key: &[u8; 48]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(48 + 48);
    match pool_identity {
        PoolIdentity::PublicKey(pk) => preimage.extend_from_slice(&pk),
        PoolIdentity::ContractPuzzleHash(ph) => preimage.extend_from_slice(&ph),
    }
    preimage.extend_from_slice(plot_public_key);
    std_hash(&preimage)
}

/// `plot_filter_input = H(plot_id ∥ challenge_hash ∥ signage_point)`.
#[must_use]
pub fn plot_filter_input(plot_id: &[u8; 32], challenge_hash: &[u8; 32], signage_point: &[u8; 32]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(96);
    preimage.extend_from_slice(plot_id);
    preimage.extend_from_slice(challenge_hash);
    preimage.extend_from_slice(signage_point);
    std_hash(&preimage)
}

/// `pos_challenge = H(plot_filter_input)`, i.e. a second hash over the filter input.
#[must_use]
pub fn pos_challenge(plot_id: &[u8; 32], challenge_hash: &[u8; 32], signage_point: &[u8; 32]) -> [u8; 32] {
    std_hash(&plot_filter_input(plot_id, challenge_hash, signage_point))
}

/// Whether the high-order `prefix_bits` of `plot_filter_input` are all zero.
///
/// `prefix_bits == 0` always passes, by definition.
#[must_use]
pub fn passes_plot_filter(prefix_bits: u8, filter_input: &[u8; 32]) -> bool {
    if prefix_bits == 0 {
        return true;
    }
    let full_bytes = (prefix_bits / 8) as usize;
    let remaining_bits = prefix_bits % 8;

    if filter_input[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }
    if remaining_bits == 0 {
        return true;
    }
    let mask = 0xFFu8 << (8 - remaining_bits);
    filter_input[full_bytes] & mask == 0
}

/// Number of leading zero bits the plot filter requires at `height`, per the
/// else-if ladder of hard-fork heights: `HARD_FORK_HEIGHT` subtracts one,
/// `PLOT_FILTER_128_HEIGHT` an additional one, and so on. Only the highest
/// applicable threshold applies -- these are not cumulative sums.
#[must_use]
pub fn prefix_bits_for_height(constants: &ConsensusConstants, height: u32) -> u8 {
    let base = constants.number_zero_bits_plot_filter_v1;

    let reduction = if height >= constants.plot_filter_32_height {
        4
    } else if height >= constants.plot_filter_64_height {
        3
    } else if height >= constants.plot_filter_128_height {
        2
    } else if height >= constants.hard_fork_height {
        1
    } else {
        0
    };

    base.saturating_sub(reduction)
}

/// `fee_quality = the last 4 bytes of H(proof ∥ challenge)`, big-endian.
///
/// By convention, a harvester has legitimately claimed the farmer reward iff
/// `fee_quality <= applied_fee_threshold` that it itself reported.
#[must_use]
pub fn fee_quality(proof: &[u8], challenge: &[u8; 32]) -> u32 {
    let mut preimage = Vec::with_capacity(proof.len() + 32);
    preimage.extend_from_slice(proof);
    preimage.extend_from_slice(challenge);
    let digest = std_hash(&preimage);
    u32::from_be_bytes([digest[28], digest[29], digest[30], digest[31]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_zero_prefix_always_passes() {
        let input = [0xFFu8; 32];
        assert!(passes_plot_filter(0, &input));
    }

    #[test]
    fn filter_passes_on_leading_zero_bits() {
        let mut input = [0xFFu8; 32];
        input[0] = 0;
        input[1] = 0b0000_0001;
        assert!(passes_plot_filter(9, &input));
        assert!(!passes_plot_filter(10, &input));
    }

    #[test]
    fn fee_quality_zero_inputs() {
        let proof = [0u8; 32];
        let challenge = [0u8; 32];
        let got = fee_quality(&proof, &challenge);

        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(&proof);
        preimage[32..].copy_from_slice(&challenge);
        let digest = std_hash(&preimage);
        let expected = u32::from_be_bytes([digest[28], digest[29], digest[30], digest[31]]);

        assert_eq!(got, expected);
    }

    #[test]
    fn prefix_bits_reduce_at_each_threshold_not_before() {
        let constants = ConsensusConstants::mainnet();

        assert_eq!(
            prefix_bits_for_height(&constants, constants.hard_fork_height - 1),
            constants.number_zero_bits_plot_filter_v1
        );
        assert_eq!(
            prefix_bits_for_height(&constants, constants.hard_fork_height),
            constants.number_zero_bits_plot_filter_v1 - 1
        );
        assert_eq!(
            prefix_bits_for_height(&constants, constants.plot_filter_128_height),
            constants.number_zero_bits_plot_filter_v1 - 2
        );
        assert_eq!(
            prefix_bits_for_height(&constants, constants.plot_filter_64_height),
            constants.number_zero_bits_plot_filter_v1 - 3
        );
        assert_eq!(
            prefix_bits_for_height(&constants, constants.plot_filter_32_height),
            constants.number_zero_bits_plot_filter_v1 - 4
        );
    }

    #[test]
    fn plot_id_depends_on_pooling_mode() {
        let plot_pk = [7u8; 48];
        let by_key = calculate_plot_id(PoolIdentity::PublicKey([1u8; 48]), &plot_pk);
        let by_puzzle = calculate_plot_id(PoolIdentity::ContractPuzzleHash([1u8; 32]), &plot_pk);
        assert_ne!(by_key, by_puzzle);
    }
}
