use crate::proof_of_space::ProofOfSpace;

/// Sent to a harvester once the farmer's and pools' public keys are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvesterHandshake {
    pub farmer_public_keys: Vec<[u8; 48]>,
    pub pool_public_keys: Vec<[u8; 48]>,
}

/// The current negotiated difficulty for one pooled p2-singleton, broadcast
/// alongside a signage point so harvesters can locally decide whether a proof
/// is merely a partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDifficulty {
    pub difficulty: u64,
    pub sub_slot_iters: u64,
    pub pool_contract_puzzle_hash: [u8; 32],
}

/// Broadcast to every connected harvester when a new signage point arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSignagePointHarvester {
    pub challenge_hash: [u8; 32],
    pub difficulty: u64,
    pub sub_slot_iters: u64,
    pub signage_point_index: u8,
    pub sp_hash: [u8; 32],
    pub peak_height: u32,
    pub last_tx_height: u32,
    pub pool_difficulties: Vec<PoolDifficulty>,
    pub filter_prefix_bits: u8,
}

/// Reported by a harvester if a proof carried a farmer-reward override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeInfo {
    pub applied_fee_threshold: u32,
}

/// A proof of space returned by a harvester in response to
/// [`NewSignagePointHarvester`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProofOfSpace {
    pub plot_identifier: String,
    pub challenge_hash: [u8; 32],
    pub sp_hash: [u8; 32],
    pub proof: ProofOfSpace,
    pub signage_point_index: u8,
    pub farmer_reward_address_override: Option<[u8; 32]>,
    pub fee_info: Option<FeeInfo>,
}

/// Requests that a harvester sign `messages` with the plot key identified by
/// `plot_identifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignatures {
    pub plot_identifier: String,
    pub challenge_hash: [u8; 32],
    pub sp_hash: [u8; 32],
    pub messages: Vec<[u8; 32]>,
}

/// A harvester's reply to [`RequestSignatures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespondSignatures {
    pub plot_identifier: String,
    pub challenge_hash: [u8; 32],
    pub sp_hash: [u8; 32],
    pub local_pk: [u8; 48],
    pub farmer_pk: [u8; 48],
    pub message_signatures: Vec<([u8; 32], [u8; 96])>,
}
