//! The signage-point dispatcher (spec.md §4.3): missing-SP accounting, cache
//! bookkeeping, and per-proof pool-partial vs. signature-request routing.
//!
//! Driven entirely by the single signage-point task per incoming SP (spec.md
//! §5) -- no internal locking, same as [`farmer_sp_cache::SignagePointCache`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use farmer_pospace::{
    calculate_iterations_quality, calculate_sp_interval_iters, fee_quality, prefix_bits_for_height,
    verify_and_get_quality_string, ConsensusConstants, PoolIdentity, ProofVerifier,
};
use farmer_protocol::{NewProofOfSpace, NewSignagePointHarvester, PoolDifficulty, RequestSignatures, SignagePoint};
use farmer_sp_cache::SignagePointCache;

/// The negotiated difficulty for one pooled p2-singleton, keyed by
/// `pool_contract_puzzle_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDifficultyEntry {
    pub difficulty: u64,
    pub sub_slot_iters: u64,
}

/// What to do with a verified proof, decided by spec.md §4.3 step 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofDecision {
    /// Failed verification, or didn't clear its required-iterations bar.
    Dropped,
    /// Qualifies as a pool partial for this p2-singleton.
    Partial { p2_singleton_puzzle_hash: [u8; 32] },
    /// Qualifies against consensus difficulty; ask the harvester to sign.
    RequestSignature(RequestSignatures),
}

/// Owns the signage-point cache and the bookkeeping needed to detect missed
/// signage points across calls.
pub struct SignagePointDispatcher {
    cache: SignagePointCache,
    constants: ConsensusConstants,
    prev_signage_point: Option<(Instant, SignagePoint)>,
}

impl SignagePointDispatcher {
    #[must_use]
    pub fn new(constants: ConsensusConstants, max_cache_age: Duration) -> Self {
        Self {
            cache: SignagePointCache::new(max_cache_age),
            constants,
            prev_signage_point: None,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &SignagePointCache {
        &self.cache
    }

    pub fn evict_expired(&mut self, now: Instant) -> usize {
        self.cache.evict_expired(now)
    }

    /// spec.md §4.3 steps 1-3: missing-SP accounting, cache insertion, and
    /// the harvester broadcast payload. Returns the broadcast alongside the
    /// number of signage points this call inferred were skipped.
    pub fn on_new_signage_point(
        &mut self,
        sp: SignagePoint,
        height: u32,
        pool_difficulties: Vec<PoolDifficulty>,
        now: Instant,
    ) -> (u32, NewSignagePointHarvester) {
        let missing = self.missing_signage_points(&sp, now);
        if missing > 0 {
            tracing::warn!(missing, challenge_hash = %hex::encode(sp.challenge_hash), "missed signage points");
        }

        self.cache.insert_sp(sp, now);

        let broadcast = NewSignagePointHarvester {
            challenge_hash: sp.challenge_hash,
            difficulty: sp.difficulty,
            sub_slot_iters: sp.sub_slot_iters,
            signage_point_index: sp.signage_point_index,
            sp_hash: sp.sp_hash,
            peak_height: height,
            last_tx_height: sp.last_tx_height,
            pool_difficulties,
            filter_prefix_bits: prefix_bits_for_height(&self.constants, height),
        };
        (missing, broadcast)
    }

    /// Step 1: same-sub-slot gap by index, or an elapsed-time estimate once
    /// the challenge chain has moved on. The 1.6 factor is the chosen
    /// allowance within the open interval `[1, 2)` spec.md leaves as a
    /// tunable.
    fn missing_signage_points(&mut self, sp: &SignagePoint, now: Instant) -> u32 {
        const LATE_ARRIVAL_FACTOR: f64 = 1.6;

        let expected_interval =
            f64::from(self.constants.sub_slot_time_target) / f64::from(self.constants.num_sps_sub_slot);

        let missing = match self.prev_signage_point {
            Some((_, prev_sp)) if prev_sp.challenge_hash == sp.challenge_hash => {
                let gap = i32::from(sp.signage_point_index) - i32::from(prev_sp.signage_point_index) - 1;
                u32::try_from(gap).unwrap_or(0)
            }
            Some((prev_time, _)) => {
                let elapsed = now.saturating_duration_since(prev_time).as_secs_f64();
                if elapsed >= LATE_ARRIVAL_FACTOR * expected_interval {
                    (elapsed / expected_interval).floor() as u32
                } else {
                    0
                }
            }
            None => 0,
        };

        self.prev_signage_point = Some((now, *sp));
        missing
    }

    /// spec.md §4.3 step 4: verify, record, and route one harvester-reported
    /// proof. `pool_difficulties` holds the currently known difficulty for
    /// every pooled p2-singleton; `reward_message` is the farmer-reward
    /// message included in the signature request for non-pooled proofs.
    #[allow(clippy::too_many_arguments)]
    pub fn process_proof(
        &mut self,
        verifier: &dyn ProofVerifier,
        sp: &SignagePoint,
        height: u32,
        peer_id: &str,
        response: &NewProofOfSpace,
        pool_difficulties: &HashMap<[u8; 32], PoolDifficultyEntry>,
        reward_message: [u8; 32],
        now: Instant,
    ) -> ProofDecision {
        let Ok(pool_identity) = response.proof.pool_identity() else {
            tracing::debug!(plot_identifier = %response.plot_identifier, "dropping proof with invalid pool identity");
            return ProofDecision::Dropped;
        };
        let Ok(plot_version) = response.proof.plot_version() else {
            tracing::debug!(plot_identifier = %response.plot_identifier, "dropping proof with unrecognized plot version");
            return ProofDecision::Dropped;
        };

        let Some(verified) = verify_and_get_quality_string(
            &self.constants,
            verifier,
            pool_identity,
            &response.proof.plot_public_key,
            plot_version,
            &response.proof.challenge,
            &sp.challenge_hash,
            &sp.sp_hash,
            &response.proof.proof,
            height,
        ) else {
            tracing::debug!(plot_identifier = %response.plot_identifier, "proof failed verification");
            return ProofDecision::Dropped;
        };

        self.cache.insert_proof(
            response.sp_hash,
            response.plot_identifier.clone(),
            peer_id.to_string(),
            sp.challenge_hash,
            verified.quality,
            now,
        );

        if response.farmer_reward_address_override.is_some() {
            check_fee_quality_legitimacy(response);
        }

        if let PoolIdentity::ContractPuzzleHash(p2_singleton_puzzle_hash) = pool_identity {
            if let Some(entry) = pool_difficulties.get(&p2_singleton_puzzle_hash) {
                return match calculate_sp_interval_iters(self.constants.num_sps_sub_slot, entry.sub_slot_iters) {
                    Ok(sp_interval_iters) => {
                        let required_iters = calculate_iterations_quality(
                            self.constants.difficulty_constant_factor,
                            &verified.quality,
                            response.proof.k_size,
                            entry.difficulty,
                            &sp.sp_hash,
                        );
                        if required_iters < sp_interval_iters {
                            ProofDecision::Partial { p2_singleton_puzzle_hash }
                        } else {
                            ProofDecision::Dropped
                        }
                    }
                    Err(err) => {
                        tracing::warn!(?err, "pool sub_slot_iters rejected, dropping partial");
                        ProofDecision::Dropped
                    }
                };
            }
        }

        let Ok(sp_interval_iters) = calculate_sp_interval_iters(self.constants.num_sps_sub_slot, sp.sub_slot_iters)
        else {
            return ProofDecision::Dropped;
        };
        let required_iters = calculate_iterations_quality(
            self.constants.difficulty_constant_factor,
            &verified.quality,
            response.proof.k_size,
            sp.difficulty,
            &sp.sp_hash,
        );
        if required_iters >= sp_interval_iters {
            return ProofDecision::Dropped;
        }

        ProofDecision::RequestSignature(RequestSignatures {
            plot_identifier: response.plot_identifier.clone(),
            challenge_hash: sp.challenge_hash,
            sp_hash: response.sp_hash,
            messages: vec![sp.sp_hash, sp.rc_hash, reward_message],
        })
    }
}

/// spec.md §4.3 step 5 / §4.1: whether a harvester's claimed farmer-reward
/// override is justified by its own reported fee quality. Logged, never
/// gates routing -- the override address itself is consensus's business.
fn check_fee_quality_legitimacy(response: &NewProofOfSpace) -> Option<bool> {
    let override_address = response.farmer_reward_address_override?;
    let fee_info = response.fee_info?;
    let quality = fee_quality(&response.proof.proof, &response.proof.challenge);
    let legitimate = quality <= fee_info.applied_fee_threshold;
    if !legitimate {
        tracing::warn!(
            override_address = %hex::encode(override_address),
            quality,
            threshold = fee_info.applied_fee_threshold,
            "farmer reward override not justified by the harvester's own fee quality"
        );
    }
    Some(legitimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmer_pospace::{calculate_plot_id, plot_filter_input, pos_challenge, std_hash, PlotVersion};
    use farmer_protocol::ProofOfSpace;

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

    fn sp(challenge_hash: [u8; 32], index: u8, difficulty: u64) -> SignagePoint {
        SignagePoint {
            challenge_hash,
            sp_hash: std_hash(&challenge_hash),
            rc_hash: [9u8; 32],
            sub_slot_iters: 64 * 1024 * 1024,
            difficulty,
            signage_point_index: index,
            peak_height: 100,
            last_tx_height: 100,
        }
    }

    #[test]
    fn same_challenge_reports_index_gap() {
        let mut dispatcher = SignagePointDispatcher::new(ConsensusConstants::test(), Duration::from_secs(600));
        let challenge = [1u8; 32];
        let now = Instant::now();

        let (missing, _) = dispatcher.on_new_signage_point(sp(challenge, 0, 1000), 100, vec![], now);
        assert_eq!(missing, 0);

        let (missing, _) = dispatcher.on_new_signage_point(sp(challenge, 3, 1000), 100, vec![], now);
        assert_eq!(missing, 2);
    }

    #[test]
    fn new_challenge_after_a_long_gap_reports_skipped_intervals() {
        let mut dispatcher = SignagePointDispatcher::new(ConsensusConstants::test(), Duration::from_secs(600));
        let now = Instant::now();
        let _ = dispatcher.on_new_signage_point(sp([1u8; 32], 0, 1000), 100, vec![], now);

        let expected_interval = f64::from(ConsensusConstants::test().sub_slot_time_target)
            / f64::from(ConsensusConstants::test().num_sps_sub_slot);
        let later = now + Duration::from_secs_f64(expected_interval * 3.0);
        let (missing, _) = dispatcher.on_new_signage_point(sp([2u8; 32], 0, 1000), 100, vec![], later);
        assert!(missing >= 2);
    }

    #[test]
    fn self_pooled_proof_below_required_iters_requests_a_signature() {
        let mut dispatcher = SignagePointDispatcher::new(ConsensusConstants::test(), Duration::from_secs(600));
        let constants = ConsensusConstants::test();
        let now = Instant::now();
        let challenge_hash = [3u8; 32];
        let signage_point = sp(challenge_hash, 0, 1);
        dispatcher.on_new_signage_point(signage_point, 100, vec![], now);

        let pool_pk = [4u8; 48];
        let plot_pk = [5u8; 48];
        let plot_id = calculate_plot_id(PoolIdentity::PublicKey(pool_pk), &plot_pk);
        let filter_input = plot_filter_input(&plot_id, &challenge_hash, &signage_point.sp_hash);
        assert!(farmer_pospace::passes_plot_filter(0, &filter_input));
        let proof_challenge = pos_challenge(&plot_id, &challenge_hash, &signage_point.sp_hash);

        let proof = ProofOfSpace {
            challenge: proof_challenge,
            pool_public_key: Some(pool_pk),
            pool_contract_puzzle_hash: None,
            plot_public_key: plot_pk,
            version: 0,
            k_size: 32,
            proof: b"proof-bytes".to_vec(),
        };
        let response = NewProofOfSpace {
            plot_identifier: "plot-a".to_string(),
            challenge_hash,
            sp_hash: signage_point.sp_hash,
            proof,
            signage_point_index: 0,
            farmer_reward_address_override: None,
            fee_info: None,
        };

        let decision = dispatcher.process_proof(
            &AcceptAll,
            &signage_point,
            100,
            "peer-1",
            &response,
            &HashMap::new(),
            [7u8; 32],
            now,
        );
        assert!(matches!(decision, ProofDecision::RequestSignature(_)));
    }

    #[test]
    fn invalid_challenge_is_dropped() {
        let mut dispatcher = SignagePointDispatcher::new(ConsensusConstants::test(), Duration::from_secs(600));
        let now = Instant::now();
        let challenge_hash = [3u8; 32];
        let signage_point = sp(challenge_hash, 0, 1);
        dispatcher.on_new_signage_point(signage_point, 100, vec![], now);

        let proof = ProofOfSpace {
            challenge: [0xAAu8; 32],
            pool_public_key: Some([1u8; 48]),
            pool_contract_puzzle_hash: None,
            plot_public_key: [2u8; 48],
            version: 0,
            k_size: 32,
            proof: b"proof-bytes".to_vec(),
        };
        let response = NewProofOfSpace {
            plot_identifier: "plot-a".to_string(),
            challenge_hash,
            sp_hash: signage_point.sp_hash,
            proof,
            signage_point_index: 0,
            farmer_reward_address_override: None,
            fee_info: None,
        };

        let decision = dispatcher.process_proof(
            &AcceptAll,
            &signage_point,
            100,
            "peer-1",
            &response,
            &HashMap::new(),
            [7u8; 32],
            now,
        );
        assert_eq!(decision, ProofDecision::Dropped);
    }
}
