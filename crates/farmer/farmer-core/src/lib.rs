//! Signage-point dispatch, key setup, and the long-lived task set that ties
//! the harvester session manager and pool clients together (spec.md §4.3,
//! §4.6, §5).

mod dispatcher;
mod keys;
mod partials;
mod tasks;

pub use dispatcher::{PoolDifficultyEntry, ProofDecision, SignagePointDispatcher};
pub use keys::{
    derive_farmer_keys, find_owner_sk, FarmerKeys, FileKeyProvider, KeyProvider, KeyProviderError, SharedKeys,
};
pub use partials::apply_proof_decision;
pub use tasks::{cache_sweeper, handshake_task, pool_state_updater, Shutdown};
