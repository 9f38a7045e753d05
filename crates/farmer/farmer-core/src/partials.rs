//! Connects a dispatched [`ProofDecision`] to the pool state it concerns
//! (spec.md §4.3 step 4: "treat as a valid partial and submit to the pool
//! client; increment points_found"). Kept separate from
//! [`crate::dispatcher`] because the dispatcher itself is pool-state-agnostic
//! -- it only classifies a proof against the difficulties it was handed.

use std::collections::HashMap;

use farmer_pool_client::PoolState;

use crate::dispatcher::ProofDecision;

/// Applies `decision` to the matching entry of `pool_states`, keyed by
/// `p2_singleton_puzzle_hash`. A no-op for anything but
/// [`ProofDecision::Partial`]; logs and does nothing if the p2-singleton
/// isn't one of this farmer's configured pools (it was accepted by the
/// dispatcher only because `pool_difficulties` listed it, which should always
/// correspond to an entry here, but pool list edits racing a proof arrival are
/// still possible).
pub fn apply_proof_decision(decision: &ProofDecision, pool_states: &mut HashMap<[u8; 32], PoolState>, now: u64) {
    let ProofDecision::Partial { p2_singleton_puzzle_hash } = decision else {
        return;
    };
    let Some(state) = pool_states.get_mut(p2_singleton_puzzle_hash) else {
        tracing::warn!(
            p2_singleton_puzzle_hash = %hex::encode(p2_singleton_puzzle_hash),
            "partial decided for a p2-singleton with no matching pool state"
        );
        return;
    };
    state.record_points_found(now);
}
