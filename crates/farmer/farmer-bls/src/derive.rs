use crate::SecretKey;

/// `m / 12381 / 8444 / 0 / 0` -- the farmer's own signing key.
#[must_use]
pub fn master_sk_to_farmer_sk(master: &SecretKey) -> SecretKey {
    derive_path(master, &[12381, 8444, 0, 0])
}

/// `m / 12381 / 8444 / 1 / 0` -- the key whose public half a pool receives as
/// `pool_public_key` for the original (non-NFT) pooling protocol.
#[must_use]
pub fn master_sk_to_pool_sk(master: &SecretKey) -> SecretKey {
    derive_path(master, &[12381, 8444, 1, 0])
}

/// `m / 12381 / 8444 / 2 / (pool_wallet_index * 10000 + index)` -- the
/// authentication key a pool expects signatures from for a given singleton.
///
/// # Panics
///
/// Panics if `pool_wallet_index` or `index` is `>= 10000`.
#[must_use]
pub fn master_sk_to_pooling_authentication_sk(
    master: &SecretKey,
    pool_wallet_index: u32,
    index: u32,
) -> SecretKey {
    assert!(pool_wallet_index < 10_000);
    assert!(index < 10_000);
    derive_path(
        master,
        &[12381, 8444, 2, pool_wallet_index * 10_000 + index],
    )
}

fn derive_path(master: &SecretKey, path: &[u32]) -> SecretKey {
    let mut derived = master.derive_hardened(path[0]);
    for &index in &path[1..] {
        derived = derived.derive_hardened(index);
    }
    derived
}
