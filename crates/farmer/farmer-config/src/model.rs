//! The recognized configuration keys from spec.md §6, modeled as a YAML
//! document. Unrecognized keys at every level round-trip losslessly through
//! a `#[serde(flatten)]` catch-all, since the farmer core is only one of
//! several processes reading and rewriting this file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::decode_puzzle_hash;
use crate::ConfigError;

/// `farmer:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerSection {
    pub xch_target_address: String,
    #[serde(default)]
    pub pool_public_keys: Vec<String>,
    #[serde(default)]
    pub enable_profiler: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One entry of `pool.pool_list`, a single p2-singleton's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolWalletConfig {
    #[serde(with = "crate::hex_bytes")]
    pub launcher_id: [u8; 32],
    /// Empty string means self-pooling: do not contact any pool.
    pub pool_url: String,
    #[serde(with = "crate::hex_bytes")]
    pub target_puzzle_hash: [u8; 32],
    pub payout_instructions: String,
    #[serde(with = "crate::hex_bytes")]
    pub owner_public_key: [u8; 48],
    #[serde(with = "crate::hex_bytes")]
    pub p2_singleton_puzzle_hash: [u8; 32],
}

impl PoolWalletConfig {
    #[must_use]
    pub fn is_self_pooling(&self) -> bool {
        self.pool_url.is_empty()
    }
}

/// `pool:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSection {
    pub xch_target_address: String,
    #[serde(default)]
    pub pool_list: Vec<PoolWalletConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// `full_node:` section -- only the one field the farmer core reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullNodeSection {
    pub selected_network: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One network's entry under `network_overrides.config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOverrideEntry {
    #[serde(default)]
    pub address_prefix: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOverridesSection {
    #[serde(default)]
    pub config: BTreeMap<String, NetworkOverrideEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The whole `config.yaml` document, restricted to the sections the farmer
/// core reads or writes; everything else round-trips via `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub farmer: FarmerSection,
    pub pool: PoolSection,
    pub full_node: FullNodeSection,
    #[serde(default)]
    pub network_overrides: NetworkOverridesSection,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Config {
    /// Whether the selected network requires HTTPS pool URLs (spec.md §4.4
    /// mainnet guard).
    #[must_use]
    pub fn enforce_https(&self) -> bool {
        self.full_node.selected_network == "mainnet"
    }

    /// The address prefix used for logging addresses under the selected
    /// network, if configured.
    #[must_use]
    pub fn address_prefix(&self) -> Option<&str> {
        self.network_overrides
            .config
            .get(&self.full_node.selected_network)
            .map(|entry| entry.address_prefix.as_str())
    }

    /// Decodes `farmer.xch_target_address` into its 32-byte puzzle hash.
    pub fn farmer_target_puzzle_hash(&self) -> Result<[u8; 32], ConfigError> {
        decode_puzzle_hash(&self.farmer.xch_target_address)
    }

    /// Decodes `pool.xch_target_address` into its 32-byte puzzle hash.
    pub fn pool_target_puzzle_hash(&self) -> Result<[u8; 32], ConfigError> {
        decode_puzzle_hash(&self.pool.xch_target_address)
    }

    /// Hex-decodes every configured pool public key.
    pub fn pool_public_keys(&self) -> Result<Vec<[u8; 48]>, ConfigError> {
        self.farmer
            .pool_public_keys
            .iter()
            .map(|s| {
                let bytes = hex::decode(s.trim_start_matches("0x"))
                    .map_err(|_| ConfigError::MalformedHex(s.clone()))?;
                bytes
                    .try_into()
                    .map_err(|_| ConfigError::MalformedHex(s.clone()))
            })
            .collect()
    }

    pub fn pool_config_mut(&mut self, launcher_id: &[u8; 32]) -> Option<&mut PoolWalletConfig> {
        self.pool
            .pool_list
            .iter_mut()
            .find(|p| &p.launcher_id == launcher_id)
    }
}
