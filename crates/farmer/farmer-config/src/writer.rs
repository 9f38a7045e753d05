//! Single-writer task for the configuration file (spec.md §9 "Configuration
//! mutation"): every write takes an advisory file lock, re-reads the file
//! from disk, mutates it, writes it back, and republishes a fresh snapshot.
//! Readers clone the current `Arc<Config>` from a `tokio::sync::watch`
//! channel without taking any lock themselves.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs4::FileExt;
use tokio::sync::watch;

use crate::model::Config;
use crate::ConfigError;

/// Owns the on-disk config file and the single channel through which every
/// mutation is published. Clone-free: only the writer task (the farmer core
/// owns exactly one) holds this; readers hold a [`watch::Receiver`].
pub struct ConfigWriter {
    path: PathBuf,
    tx: watch::Sender<Arc<Config>>,
}

impl ConfigWriter {
    /// Reads `path` and sets up the publish channel, seeded with the initial
    /// snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = read_config(&path).await?;
        let (tx, _rx) = watch::channel(Arc::new(config));
        Ok(Self { path, tx })
    }

    /// A receiver that always observes the most recently published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.tx.subscribe()
    }

    /// The current snapshot, without waiting for a new one.
    #[must_use]
    pub fn current(&self) -> Arc<Config> {
        self.tx.borrow().clone()
    }

    /// Sets `farmer.xch_target_address` and/or `pool.xch_target_address`.
    pub async fn set_reward_targets(
        &self,
        farmer_target_address: Option<String>,
        pool_target_address: Option<String>,
    ) -> Result<(), ConfigError> {
        self.mutate(|config| {
            if let Some(address) = farmer_target_address {
                config.farmer.xch_target_address = address;
            }
            if let Some(address) = pool_target_address {
                config.pool.xch_target_address = address;
            }
        })
        .await
    }

    /// Sets `payout_instructions` for the p2-singleton identified by
    /// `launcher_id`.
    pub async fn set_payout_instructions(
        &self,
        launcher_id: [u8; 32],
        payout_instructions: String,
    ) -> Result<(), ConfigError> {
        self.mutate(|config| {
            if let Some(pool_config) = config.pool_config_mut(&launcher_id) {
                pool_config.payout_instructions = payout_instructions;
            }
        })
        .await
    }

    /// Rewrites `pool_url` for the p2-singleton identified by `launcher_id`,
    /// e.g. after a pool-info redirect chain (spec.md §4.4(a)).
    pub async fn update_pool_url(
        &self,
        launcher_id: [u8; 32],
        new_pool_url: String,
    ) -> Result<(), ConfigError> {
        self.mutate(|config| {
            if let Some(pool_config) = config.pool_config_mut(&launcher_id) {
                pool_config.pool_url = new_pool_url;
            }
        })
        .await
    }

    /// Takes the advisory lock, re-reads the file, applies `mutation`, writes
    /// the result back, and publishes the new snapshot. All writer methods
    /// funnel through here so concurrent callers serialize on the same lock.
    async fn mutate(&self, mutation: impl FnOnce(&mut Config) + Send + 'static) -> Result<(), ConfigError> {
        let path = self.path.clone();
        let config = tokio::task::spawn_blocking(move || -> Result<Config, ConfigError> {
            let file = File::options()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
            file.lock_exclusive().map_err(|e| ConfigError::Io(e.to_string()))?;

            let mut config = load_config_sync(&path)?;
            mutation(&mut config);
            save_config_sync(&path, &config)?;

            file.unlock().map_err(|e| ConfigError::Io(e.to_string()))?;
            Ok(config)
        })
        .await
        .map_err(|e| ConfigError::Io(e.to_string()))??;

        self.tx.send_replace(Arc::new(config));
        tracing::debug!("configuration file updated");
        Ok(())
    }
}

async fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || load_config_sync(&path))
        .await
        .map_err(|e| ConfigError::Io(e.to_string()))?
}

fn load_config_sync(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn save_config_sync(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let serialized = serde_yaml::to_string(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
    std::fs::write(path, serialized).map_err(|e| ConfigError::Io(e.to_string()))
}
