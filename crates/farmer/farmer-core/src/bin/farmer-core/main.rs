//! Farmer core entry point: loads configuration, derives keys, and drives
//! the long-lived tasks spec.md §5 names. The RPC/CLI surface beyond this
//! single entry point, and the network layer that accepts harvester/full-node
//! connections, are out of scope (spec.md §1) -- this wires the pieces those
//! layers would drive.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use farmer_core::{
    cache_sweeper, derive_farmer_keys, find_owner_sk, pool_state_updater, FileKeyProvider, KeyProvider,
    SharedKeys, Shutdown, SignagePointDispatcher,
};
use farmer_config::ConfigWriter;
use farmer_pool_client::{update_pool_state, PoolKeys, PoolState, ReqwestPoolHttp};
use farmer_pospace::ConsensusConstants;
use parking_lot::Mutex;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[clap(about, version)]
struct Args {
    /// Path to the Chia-style `config.yaml` this farmer reads and mutates.
    #[arg(long)]
    config: PathBuf,

    /// Directory holding one raw EIP-2333 seed file per root key.
    #[arg(long)]
    keys_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let shutdown = Shutdown::new();

    let config_writer = ConfigWriter::open(&args.config).await?;
    let config = config_writer.current();
    let constants = if config.enforce_https() {
        ConsensusConstants::mainnet()
    } else {
        ConsensusConstants::test()
    };

    let key_provider = FileKeyProvider::new(&args.keys_dir);
    let owner_public_keys: Vec<[u8; 48]> = config.pool.pool_list.iter().map(|p| p.owner_public_key).collect();
    let root_secrets = key_provider.root_secrets().await?;
    if root_secrets.is_empty() {
        warn!("no root secrets available yet, entering polling wait for key setup");
    }
    let keys: SharedKeys = Arc::new(Mutex::new(derive_farmer_keys(&root_secrets, &owner_public_keys)));

    let dispatcher = Arc::new(Mutex::new(SignagePointDispatcher::new(
        constants,
        Duration::from_secs(3 * u64::from(constants.sub_slot_time_target)),
    )));

    let mut config_changes = config_writer.subscribe();
    {
        let keys = Arc::clone(&keys);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.wait() => return,
                    changed = config_changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let config = config_changes.borrow().clone();
                        let owner_public_keys: Vec<[u8; 48]> =
                            config.pool.pool_list.iter().map(|p| p.owner_public_key).collect();
                        match key_provider.root_secrets().await {
                            Ok(root_secrets) => {
                                let refreshed = derive_farmer_keys(&root_secrets, &owner_public_keys);
                                *keys.lock() = refreshed;
                                info!("re-derived keys after configuration change");
                            }
                            Err(err) => error!(%err, "failed to refresh root secrets"),
                        }
                    }
                }
            }
        });
    }

    let http = Arc::new(ReqwestPoolHttp::default());
    let enforce_https = config.enforce_https();
    let farmer_target_puzzle_hash = config.farmer_target_puzzle_hash()?;

    let mut pool_tasks = Vec::new();
    for pool_config in &config.pool.pool_list {
        let mut pool_state = PoolState::new(pool_config.clone());
        let launcher_id = pool_config.launcher_id;
        let http = Arc::clone(&http);
        let keys = Arc::clone(&keys);
        let shutdown = shutdown.clone();
        let payout_instructions = pool_config.payout_instructions.clone();

        let task = tokio::spawn(async move {
            pool_state_updater(shutdown, || false, || async {
                let pool_keys = {
                    let keys = keys.lock();
                    let owner_sk = find_owner_sk(&keys.pool_secret_keys, &pool_state.pool_config.owner_public_key);
                    let authentication_sk = keys.authentication_sk(&pool_state.pool_config.owner_public_key).cloned();
                    owner_sk.zip(authentication_sk)
                };
                let Some((owner_sk, authentication_sk)) = pool_keys else {
                    warn!(launcher_id = %hex::encode(launcher_id), "no matching keys yet for this pool, skipping update");
                    return;
                };
                let pool_keys = PoolKeys {
                    authentication_pk: authentication_sk.public_key(),
                    authentication_sk,
                    owner_sk,
                };

                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default();

                update_pool_state(&mut pool_state, &*http, &pool_keys, &payout_instructions, enforce_https, now).await;
            })
            .await;
        });
        pool_tasks.push(task);
    }

    let sweeper = {
        let dispatcher = Arc::clone(&dispatcher);
        let shutdown = shutdown.clone();
        let sub_slot_time_target = Duration::from_secs(u64::from(constants.sub_slot_time_target));
        tokio::spawn(async move {
            cache_sweeper(
                shutdown,
                sub_slot_time_target,
                || {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move {
                        let evicted = dispatcher.lock().evict_expired(std::time::Instant::now());
                        if evicted > 0 {
                            info!(evicted, "swept expired signage point cache entries");
                        }
                    }
                },
                || async {
                    tracing::debug!("connection-refresh tick");
                },
            )
            .await;
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown.trigger();

    for task in pool_tasks {
        let _ = task.await;
    }
    let _ = sweeper.await;

    let _ = farmer_target_puzzle_hash;
    Ok(())
}
