/// Subset of consensus constants the farmer core needs to reproduce plot
/// filter and signage point timing bit-exactly.
///
/// Mirrors the relevant fields of chia's `ConsensusConstants`; the farmer
/// core does not need the block-reward, VDF or mempool related fields since
/// it neither validates blocks nor runs VDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusConstants {
    /// Target number of seconds per sub-slot.
    pub sub_slot_time_target: u16,
    /// Number of signage points per sub-slot, including the 0th.
    pub num_sps_sub_slot: u32,
    /// Difference between signage point and infusion point, in sp intervals.
    pub num_sp_intervals_extra: u8,
    /// `H(plot_id ∥ challenge_hash ∥ signage_point)` must start with this many
    /// zero bits, prior to any hard-fork adjustment.
    pub number_zero_bits_plot_filter_v1: u8,
    /// Smallest allowed v1 plot size (`k`).
    pub min_plot_size: u8,
    /// Largest allowed v1 plot size (`k`).
    pub max_plot_size: u8,
    /// Height of the first plot filter adjustment (-1 zero bit).
    pub hard_fork_height: u32,
    /// Height of the second plot filter adjustment (-1 further zero bit).
    pub plot_filter_128_height: u32,
    /// Height of the third plot filter adjustment (-1 further zero bit).
    pub plot_filter_64_height: u32,
    /// Height of the fourth plot filter adjustment (-1 further zero bit).
    pub plot_filter_32_height: u32,
    /// Fixed prefix-bit count for v2-format plots. Unlike v1, v2 does not use
    /// the height-dependent else-if ladder at all.
    pub number_zero_bits_plot_filter_v2: u8,
    /// Multiplied by difficulty to get required VDF iterations.
    pub difficulty_constant_factor: u128,
}

impl ConsensusConstants {
    /// Mainnet constants, as deployed.
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            sub_slot_time_target: 600,
            num_sps_sub_slot: 64,
            num_sp_intervals_extra: 3,
            number_zero_bits_plot_filter_v1: 9,
            min_plot_size: 32,
            max_plot_size: 50,
            hard_fork_height: 5_496_000,
            plot_filter_128_height: 10_542_000,
            plot_filter_64_height: 15_592_000,
            plot_filter_32_height: 20_643_000,
            number_zero_bits_plot_filter_v2: 9,
            difficulty_constant_factor: 2u128.pow(67),
        }
    }

    /// Scaled-down constants used in tests, matching chia's `testnet0`-style
    /// fast sub-slots so cache eviction/timeout tests don't need real-time
    /// sleeps on the order of minutes.
    #[must_use]
    pub fn test() -> Self {
        Self {
            sub_slot_time_target: 20,
            ..Self::mainnet()
        }
    }
}
