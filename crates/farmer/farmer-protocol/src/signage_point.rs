/// A periodic challenge emitted by consensus within a sub-slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignagePoint {
    pub challenge_hash: [u8; 32],
    /// "cc" (challenge chain) signage point hash.
    pub sp_hash: [u8; 32],
    /// "rc" (reward chain) signage point hash.
    pub rc_hash: [u8; 32],
    pub sub_slot_iters: u64,
    pub difficulty: u64,
    pub signage_point_index: u8,
    pub peak_height: u32,
    pub last_tx_height: u32,
}
