//! Configuration file model and the serialized lock-and-load writer that
//! every config mutation funnels through (spec.md §6, §9).
//!
//! Parsing the farmer's `config.yaml` is explicitly out of scope for the
//! farmer core per spec.md §1, but the core still needs a typed view of the
//! recognized keys (§6) and the single-writer mutation path (§9) that
//! `set_reward_targets`, `set_payout_instructions` and `update_pool_url` use.

mod address;
mod hex_bytes;
mod model;
mod writer;

pub use address::{decode_puzzle_hash, encode_address};
pub use model::{
    Config, FarmerSection, FullNodeSection, NetworkOverrideEntry, NetworkOverridesSection,
    PoolSection, PoolWalletConfig,
};
pub use writer::ConfigWriter;

/// Errors from reading, parsing or writing the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("could not parse configuration: {0}")]
    Parse(String),
    #[error("malformed address: {0}")]
    MalformedAddress(String),
    #[error("malformed hex string: {0}")]
    MalformedHex(String),
}
