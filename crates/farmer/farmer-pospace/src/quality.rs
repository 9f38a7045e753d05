use crate::{
    calculate_plot_id, passes_plot_filter, plot_filter_input, pos_challenge, ConsensusConstants,
    PlotVersion, PoolIdentity,
};

/// A successfully verified proof: the recomputed plot id and the 32-byte
/// quality string the plot format verifier produced for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedProof {
    pub plot_id: [u8; 32],
    pub quality: [u8; 32],
}

/// Delegates table-specific quality string decoding to whichever plot format
/// (v1 chiapos or v2) the proof claims to use.
///
/// This boundary exists because decoding the forward-function chain embedded
/// in a raw proof depends on the plot's on-disk table format, a concern that
/// belongs to the harvester/plot-format layer rather than the farmer core --
/// the same separation `chia-consensus` draws by delegating to the external
/// `chiapos` crate for `validate_proof`.
pub trait ProofVerifier {
    /// Returns the 32-byte quality string for `proof_bytes`, or `None` if the
    /// proof does not decode to a valid entry for `plot_id`/`challenge`.
    fn quality_string(
        &self,
        plot_version: PlotVersion,
        plot_id: &[u8; 32],
        challenge: &[u8; 32],
        proof_bytes: &[u8],
    ) -> Option<[u8; 32]>;
}

/// Recomputes the challenge and plot filter, then asks the plot-format
/// verifier for the quality string.
///
/// Returns `Some` only if: the k-size is valid for the claimed plot version,
/// the recomputed `pos_challenge` matches `proof_challenge`, the plot filter
/// passes at `height`, and the format verifier accepts the proof bytes.
#[must_use]
pub fn verify_and_get_quality_string(
    constants: &ConsensusConstants,
    verifier: &dyn ProofVerifier,
    pool_identity: PoolIdentity,
    plot_public_key: &[u8; 48],
    plot_version: PlotVersion,
    proof_challenge: &[u8; 32],
    original_challenge_hash: &[u8; 32],
    signage_point: &[u8; 32],
    proof_bytes: &[u8],
    height: u32,
) -> Option<VerifiedProof> {
    if !plot_version.k_size_is_valid(constants) {
        return None;
    }

    let plot_id = calculate_plot_id(pool_identity, plot_public_key);

    let expected_challenge = pos_challenge(&plot_id, original_challenge_hash, signage_point);
    if &expected_challenge != proof_challenge {
        return None;
    }

    // v2 plots use a single fixed prefix-bit count; only v1 plots go through
    // the height-dependent else-if ladder.
    let prefix_bits = match plot_version {
        PlotVersion::V1 { .. } => crate::prefix_bits_for_height(constants, height),
        PlotVersion::V2 { .. } => constants.number_zero_bits_plot_filter_v2,
    };
    let filter_input = plot_filter_input(&plot_id, original_challenge_hash, signage_point);
    if !passes_plot_filter(prefix_bits, &filter_input) {
        return None;
    }

    let quality = verifier.quality_string(plot_version, &plot_id, proof_challenge, proof_bytes)?;

    Some(VerifiedProof { plot_id, quality })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::std_hash;

    struct AcceptAll;

    impl ProofVerifier for AcceptAll {
        fn quality_string(
            &self,
            _plot_version: PlotVersion,
            plot_id: &[u8; 32],
            challenge: &[u8; 32],
            proof_bytes: &[u8],
        ) -> Option<[u8; 32]> {
            let mut preimage = Vec::new();
            preimage.extend_from_slice(plot_id);
            preimage.extend_from_slice(challenge);
            preimage.extend_from_slice(proof_bytes);
            Some(std_hash(&preimage))
        }
    }

    #[test]
    fn rejects_challenge_mismatch() {
        let constants = ConsensusConstants::mainnet();
        let plot_pk = [1u8; 48];
        let result = verify_and_get_quality_string(
            &constants,
            &AcceptAll,
            PoolIdentity::PublicKey([2u8; 48]),
            &plot_pk,
            PlotVersion::V1 { k_size: 32 },
            &[0xAAu8; 32], // wrong challenge
            &[3u8; 32],
            &[4u8; 32],
            b"proof",
            0,
        );
        assert!(result.is_none());
    }

    #[test]
    fn rejects_invalid_k_size() {
        let constants = ConsensusConstants::mainnet();
        let plot_pk = [1u8; 48];
        let result = verify_and_get_quality_string(
            &constants,
            &AcceptAll,
            PoolIdentity::PublicKey([2u8; 48]),
            &plot_pk,
            PlotVersion::V2 { k_size: 29 }, // not in {28, 30, 32}
            &[0u8; 32],
            &[3u8; 32],
            &[4u8; 32],
            b"proof",
            0,
        );
        assert!(result.is_none());
    }

    #[test]
    fn accepts_matching_challenge_and_filter() {
        let constants = ConsensusConstants::mainnet();
        let plot_pk = [1u8; 48];
        let pool_identity = PoolIdentity::PublicKey([2u8; 48]);
        let plot_id = calculate_plot_id(pool_identity, &plot_pk);
        let challenge_hash = [3u8; 32];
        let sp = [4u8; 32];
        let challenge = pos_challenge(&plot_id, &challenge_hash, &sp);

        // Use prefix_bits = 0 (height 0, before any hard fork) so the filter always passes.
        let result = verify_and_get_quality_string(
            &constants,
            &AcceptAll,
            pool_identity,
            &plot_pk,
            PlotVersion::V1 { k_size: 32 },
            &challenge,
            &challenge_hash,
            &sp,
            b"proof",
            0,
        );
        assert!(result.is_some());
        assert_eq!(result.unwrap().plot_id, plot_id);
    }
}
