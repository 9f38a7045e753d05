//! Key setup (spec.md §4.6): fetch root secrets from the key-provider
//! capability, derive the farmer/pool child keys, and cache an
//! authentication key per pool by scanning root secrets against each pool's
//! `owner_public_key` -- `get_authentication_sk` in `farmer.py`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use farmer_bls::{master_sk_to_farmer_sk, master_sk_to_pool_sk, master_sk_to_pooling_authentication_sk, SecretKey};
use parking_lot::Mutex;

/// Shared because key material can be requested concurrently by the
/// per-peer handshake task and the pool-client task (spec.md §4.6); every
/// other long-lived task owns its state outright and needs no lock.
pub type SharedKeys = Arc<Mutex<FarmerKeys>>;

/// External collaborator boundary: keychain storage is out of scope for the
/// farmer core (spec.md §1), so key material is obtained through this
/// capability rather than read from disk directly.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn root_secrets(&self) -> Result<Vec<SecretKey>, KeyProviderError>;
}

#[derive(Debug, thiserror::Error)]
#[error("key provider failed: {0}")]
pub struct KeyProviderError(pub String);

/// Everything key setup derives from the current root secret list.
#[derive(Clone)]
pub struct FarmerKeys {
    pub farmer_secret_keys: Vec<SecretKey>,
    pub pool_secret_keys: Vec<SecretKey>,
    authentication_sks: HashMap<[u8; 48], SecretKey>,
}

impl std::fmt::Debug for FarmerKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmerKeys")
            .field("farmer_secret_keys", &self.farmer_secret_keys.len())
            .field("pool_secret_keys", &self.pool_secret_keys.len())
            .field("authentication_sks", &self.authentication_sks.len())
            .finish()
    }
}

impl FarmerKeys {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.farmer_secret_keys.is_empty() && self.pool_secret_keys.is_empty()
    }

    /// The authentication key cached for a pool's `owner_public_key`, if a
    /// matching root secret has been found.
    #[must_use]
    pub fn authentication_sk(&self, owner_public_key: &[u8; 48]) -> Option<&SecretKey> {
        self.authentication_sks.get(owner_public_key)
    }

    #[must_use]
    pub fn farmer_public_keys(&self) -> Vec<[u8; 48]> {
        self.farmer_secret_keys.iter().map(|sk| sk.public_key().to_bytes()).collect()
    }
}

/// Derives farmer and pool child keys from every root secret, and caches an
/// authentication key for each `owner_public_key` by scanning the root
/// secret list: the root at index `i` whose pool child key matches
/// `owner_public_key` supplies `master_sk_to_pooling_authentication_sk(root, 0, i)`.
/// Matches `get_authentication_sk`'s pool-config-to-root lookup in `farmer.py`.
#[must_use]
pub fn derive_farmer_keys(root_secrets: &[SecretKey], owner_public_keys: &[[u8; 48]]) -> FarmerKeys {
    let farmer_secret_keys: Vec<SecretKey> = root_secrets.iter().map(master_sk_to_farmer_sk).collect();
    let pool_secret_keys: Vec<SecretKey> = root_secrets.iter().map(master_sk_to_pool_sk).collect();

    let mut authentication_sks = HashMap::new();
    for owner_public_key in owner_public_keys {
        if let Some(sk) = find_authentication_sk(root_secrets, &pool_secret_keys, owner_public_key) {
            authentication_sks.insert(*owner_public_key, sk);
        } else {
            tracing::warn!(
                owner_public_key = %hex::encode(owner_public_key),
                "no root secret's pool key matches this owner_public_key; pool calls requiring it will be skipped"
            );
        }
    }

    FarmerKeys {
        farmer_secret_keys,
        pool_secret_keys,
        authentication_sks,
    }
}

/// The owner secret key matching `owner_public_key`, i.e. `find_owner_sk` in
/// `farmer.py`: the pool-child key (not the authentication key) whose public
/// half equals the pool's configured owner key.
#[must_use]
pub fn find_owner_sk(pool_secret_keys: &[SecretKey], owner_public_key: &[u8; 48]) -> Option<SecretKey> {
    pool_secret_keys
        .iter()
        .find(|sk| sk.public_key().to_bytes() == *owner_public_key)
        .cloned()
}

fn find_authentication_sk(
    root_secrets: &[SecretKey],
    pool_secret_keys: &[SecretKey],
    owner_public_key: &[u8; 48],
) -> Option<SecretKey> {
    let index = pool_secret_keys
        .iter()
        .position(|sk| sk.public_key().to_bytes() == *owner_public_key)?;
    let root = &root_secrets[index];
    let index = u32::try_from(index).ok()?;
    Some(master_sk_to_pooling_authentication_sk(root, 0, index))
}

/// The simplest possible concrete [`KeyProvider`]: treats every regular file
/// directly inside `directory` as one raw EIP-2333 seed. Enough to run the
/// binary standalone; a real deployment swaps in a keychain RPC client
/// behind the same trait (spec.md §1 models keychain storage as external).
pub struct FileKeyProvider {
    directory: PathBuf,
}

impl FileKeyProvider {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl KeyProvider for FileKeyProvider {
    async fn root_secrets(&self) -> Result<Vec<SecretKey>, KeyProviderError> {
        let directory = self.directory.clone();
        tokio::task::spawn_blocking(move || {
            let mut secrets = Vec::new();
            let entries = std::fs::read_dir(&directory).map_err(|e| KeyProviderError(e.to_string()))?;
            for entry in entries {
                let entry = entry.map_err(|e| KeyProviderError(e.to_string()))?;
                let is_file = entry.file_type().map_err(|e| KeyProviderError(e.to_string()))?.is_file();
                if !is_file {
                    continue;
                }
                let seed = std::fs::read(entry.path()).map_err(|e| KeyProviderError(e.to_string()))?;
                secrets.push(SecretKey::from_seed(&seed));
            }
            Ok(secrets)
        })
        .await
        .map_err(|e| KeyProviderError(e.to_string()))?
    }
}
