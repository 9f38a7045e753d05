//! Chia's bech32m `xch1...`-style addresses: a human-readable prefix plus a
//! 32-byte puzzle hash payload, used by every `*_target_address` config key.

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32m, ByteIterExt, Fe32IterExt, Hrp};

use crate::ConfigError;

/// Decodes a bech32m address into its 32-byte puzzle hash payload.
pub fn decode_puzzle_hash(address: &str) -> Result<[u8; 32], ConfigError> {
    let checked = CheckedHrpstring::new::<Bech32m>(address)
        .map_err(|_| ConfigError::MalformedAddress(address.to_string()))?;

    let bytes: Vec<u8> = checked.byte_iter().collect();
    bytes
        .try_into()
        .map_err(|_| ConfigError::MalformedAddress(address.to_string()))
}

/// Encodes a 32-byte puzzle hash as a bech32m address under `prefix`.
pub fn encode_address(prefix: &str, puzzle_hash: &[u8; 32]) -> Result<String, ConfigError> {
    let hrp = Hrp::parse(prefix).map_err(|_| ConfigError::MalformedAddress(prefix.to_string()))?;

    let bytes: Vec<u8> = puzzle_hash
        .iter()
        .copied()
        .bytes_to_fes()
        .with_checksum::<Bech32m>(&hrp)
        .bytes()
        .collect();

    String::from_utf8(bytes).map_err(|_| ConfigError::MalformedAddress(prefix.to_string()))
}
