//! Per-p2-singleton pool state machine (spec.md §4.4).

use farmer_bls::{PublicKey, SecretKey};
use farmer_config::PoolWalletConfig;
use farmer_protocol::{AuthenticationPayload, PoolErrorCode, PostFarmerPayload, PostFarmerRequest, PutFarmerPayload, PutFarmerRequest};

use crate::counters::{PoolErrorWindow, RollingCounter};
use crate::http::{self, GetFarmerOutcome, GetFarmerParams, PoolHttp, PostFarmerOutcome, PutFarmerOutcome};

const UPDATE_POOL_INFO_INTERVAL: u64 = 3600;
const UPDATE_POOL_INFO_FAILURE_RETRY_INTERVAL: u64 = 120;
const UPDATE_POOL_FARMER_INFO_INTERVAL: u64 = 300;

/// The keys a pool update needs; owned by key setup (spec.md §4.6), borrowed
/// here for the duration of one call.
#[derive(Debug, Clone)]
pub struct PoolKeys {
    pub authentication_sk: SecretKey,
    pub authentication_pk: PublicKey,
    pub owner_sk: SecretKey,
}

/// The rolling counters spec.md §4.4 requires: "missing/stale/insufficient/
/// invalid/valid partials, points-found, points-acknowledged, and errors are
/// all tracked this way."
#[derive(Debug, Default, Clone)]
pub struct PoolCounters {
    pub pool_errors_24h: PoolErrorWindow,
    pub valid_partials_24h: RollingCounter,
    pub invalid_partials_24h: RollingCounter,
    pub insufficient_partials_24h: RollingCounter,
    pub stale_partials_24h: RollingCounter,
    pub missing_partials_24h: RollingCounter,
    pub points_found_24h: RollingCounter,
    pub points_acknowledged_24h: RollingCounter,
}

/// One `pool_list` entry's live state: the config snapshot it was built from
/// plus everything learned from the pool since.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub pool_config: PoolWalletConfig,
    pub current_difficulty: Option<u64>,
    pub current_points: Option<u64>,
    pub authentication_token_timeout: Option<u8>,
    next_pool_info_attempt: u64,
    next_farmer_info_attempt: u64,
    pub counters: PoolCounters,
}

impl PoolState {
    #[must_use]
    pub fn new(pool_config: PoolWalletConfig) -> Self {
        Self {
            pool_config,
            current_difficulty: None,
            current_points: None,
            authentication_token_timeout: None,
            next_pool_info_attempt: 0,
            next_farmer_info_attempt: 0,
            counters: PoolCounters::default(),
        }
    }

    /// Self-pooling (empty `pool_url`) disables all three recurring actions,
    /// but the record is kept for uniform reporting (spec.md §4.4 last line).
    #[must_use]
    pub fn is_self_pooling(&self) -> bool {
        self.pool_config.is_self_pooling()
    }

    /// Records a partial the dispatcher classified as pool-bound (spec.md
    /// §4.3 step 4: "treat as a valid partial and submit to the pool client;
    /// increment points_found"). The value recorded is the difficulty the
    /// proof was checked against, so the 24h window reflects what the farmer
    /// expects the pool to credit, not what the pool later confirms.
    pub fn record_points_found(&mut self, now: u64) {
        let difficulty = self.current_difficulty.unwrap_or(0);
        self.counters.points_found_24h.record(now, difficulty);
    }
}

/// Runs whichever of the three recurring actions (pool_info refresh, farmer
/// refresh, and the registration/update it can trigger) are due at `now`.
///
/// Self-pooling pools and the mainnet-HTTPS guard both short-circuit before
/// any network call; a guard violation is recorded as a pool error rather
/// than silently skipped, per spec.md §4.4's "aborted with an error counter
/// increment".
pub async fn update_pool_state(
    state: &mut PoolState,
    http: &dyn PoolHttp,
    keys: &PoolKeys,
    payout_instructions: &str,
    enforce_https: bool,
    now: u64,
) {
    if state.is_self_pooling() {
        return;
    }

    if enforce_https && !state.pool_config.pool_url.starts_with("https://") {
        tracing::error!(
            pool_url = %state.pool_config.pool_url,
            "mainnet requires an https pool_url, aborting update"
        );
        state.counters.pool_errors_24h.record(
            now,
            None,
            "pool_url does not start with https:// on mainnet".to_string(),
        );
        return;
    }

    if now >= state.next_pool_info_attempt {
        refresh_pool_info(state, http, now).await;
    }

    let Some(_timeout) = state.authentication_token_timeout else {
        tracing::warn!(
            pool_url = %state.pool_config.pool_url,
            "no pool-specific authentication_token_timeout yet, skipping farmer refresh"
        );
        return;
    };

    if now >= state.next_farmer_info_attempt {
        refresh_farmer(state, http, keys, payout_instructions, now).await;
    }
}

async fn refresh_pool_info(state: &mut PoolState, http: &dyn PoolHttp, now: u64) {
    match http.get_pool_info(&state.pool_config.pool_url).await {
        Ok(outcome) => {
            state.authentication_token_timeout = Some(outcome.body.authentication_token_timeout);
            if state.current_difficulty.is_none() {
                state.current_difficulty = Some(outcome.body.minimum_difficulty);
            }
            if let Some(new_url) = outcome.new_pool_url() {
                tracing::warn!(
                    old_url = %state.pool_config.pool_url,
                    new_url = %new_url,
                    "pool migrated via an all-permanent redirect chain"
                );
                state.pool_config.pool_url = new_url;
            }
            state.next_pool_info_attempt = now + UPDATE_POOL_INFO_INTERVAL;
        }
        Err(error) => {
            tracing::warn!(pool_url = %state.pool_config.pool_url, %error, "pool_info refresh failed");
            state.counters.pool_errors_24h.record(now, None, error.to_string());
            state.next_pool_info_attempt = now + UPDATE_POOL_INFO_FAILURE_RETRY_INTERVAL;
        }
    }
}

fn authentication_token(now: u64, timeout_minutes: u8) -> u64 {
    now / 60 / u64::from(timeout_minutes)
}

async fn refresh_farmer(state: &mut PoolState, http: &dyn PoolHttp, keys: &PoolKeys, payout_instructions: &str, now: u64) {
    let timeout = state
        .authentication_token_timeout
        .expect("caller checked authentication_token_timeout is set");
    let token = authentication_token(now, timeout);

    let message = AuthenticationPayload {
        prefix: "get_farmer",
        launcher_id: state.pool_config.launcher_id,
        target_puzzle_hash: state.pool_config.target_puzzle_hash,
        authentication_token: token,
    }
    .hash();
    let signature = keys.authentication_sk.sign(&message);

    let outcome = http
        .get_farmer(GetFarmerParams {
            launcher_id: state.pool_config.launcher_id,
            authentication_token: token,
            signature: signature.to_bytes(),
            pool_url: &state.pool_config.pool_url,
        })
        .await;

    state.next_farmer_info_attempt = now + UPDATE_POOL_FARMER_INFO_INTERVAL;

    match outcome {
        Ok(GetFarmerOutcome::Success(response)) => {
            state.current_difficulty = Some(response.current_difficulty);
            state.current_points = Some(response.current_points);
            if !response
                .payout_instructions
                .eq_ignore_ascii_case(payout_instructions)
            {
                tracing::warn!(
                    pool_url = %state.pool_config.pool_url,
                    "payout_instructions differ from the pool's record, updating"
                );
                update_farmer(state, http, keys, payout_instructions, token, now).await;
            }
        }
        Ok(GetFarmerOutcome::Error(error)) => {
            tracing::warn!(
                pool_url = %state.pool_config.pool_url,
                error_code = http::error_code_name(error.error_code),
                "get_farmer returned an error"
            );
            state
                .counters
                .pool_errors_24h
                .record(now, Some(u8::from(error.error_code)), error.error_message.unwrap_or_default());
            match error.error_code {
                PoolErrorCode::FarmerNotKnown => {
                    register_farmer(state, http, keys, payout_instructions, token, now).await;
                }
                PoolErrorCode::InvalidSignature => {
                    update_farmer(state, http, keys, payout_instructions, token, now).await;
                }
                _ => {}
            }
        }
        Err(error) => {
            tracing::warn!(pool_url = %state.pool_config.pool_url, %error, "farmer refresh failed");
            state.counters.pool_errors_24h.record(now, None, error.to_string());
        }
    }
}

async fn register_farmer(
    state: &mut PoolState,
    http: &dyn PoolHttp,
    keys: &PoolKeys,
    payout_instructions: &str,
    authentication_token: u64,
    now: u64,
) {
    if keys.owner_sk.public_key().to_bytes() != state.pool_config.owner_public_key {
        tracing::error!(
            pool_url = %state.pool_config.pool_url,
            "owner secret key does not match the configured owner_public_key, cannot register"
        );
        state.counters.pool_errors_24h.record(
            now,
            None,
            "owner_sk does not match pool_config.owner_public_key".to_string(),
        );
        return;
    }

    let payload = PostFarmerPayload {
        launcher_id: state.pool_config.launcher_id,
        authentication_token,
        authentication_public_key: keys.authentication_pk.to_bytes(),
        payout_instructions: payout_instructions.to_string(),
        suggested_difficulty: None,
    };
    let signature = keys.owner_sk.sign(&payload.get_hash());
    let request = PostFarmerRequest {
        payload,
        signature: signature.to_bytes(),
    };

    match http.post_farmer(&state.pool_config.pool_url, &request).await {
        Ok(PostFarmerOutcome::Success(response)) => {
            tracing::info!(
                pool_url = %state.pool_config.pool_url,
                welcome_message = %response.welcome_message,
                "registered with pool"
            );
            // Boxed to break the refresh_farmer <-> register_farmer cycle: two
            // mutually recursive async fns would otherwise need an
            // infinitely-sized future.
            Box::pin(refresh_farmer(state, http, keys, payout_instructions, now)).await;
        }
        Ok(PostFarmerOutcome::Error(error)) => {
            tracing::warn!(
                pool_url = %state.pool_config.pool_url,
                error_code = http::error_code_name(error.error_code),
                "post_farmer registration was rejected"
            );
            state
                .counters
                .pool_errors_24h
                .record(now, Some(u8::from(error.error_code)), error.error_message.unwrap_or_default());
        }
        Err(error) => {
            tracing::warn!(pool_url = %state.pool_config.pool_url, %error, "post_farmer request failed");
            state.counters.pool_errors_24h.record(now, None, error.to_string());
        }
    }
}

async fn update_farmer(
    state: &mut PoolState,
    http: &dyn PoolHttp,
    keys: &PoolKeys,
    payout_instructions: &str,
    authentication_token: u64,
    now: u64,
) {
    let payload = PutFarmerPayload {
        launcher_id: state.pool_config.launcher_id,
        authentication_token,
        payout_instructions: payout_instructions.to_string(),
        suggested_difficulty: None,
    };
    let signature = keys.owner_sk.sign(&payload.get_hash());
    let request = PutFarmerRequest {
        payload,
        signature: signature.to_bytes(),
    };

    match http.put_farmer(&state.pool_config.pool_url, &request).await {
        Ok(PutFarmerOutcome::Success) => {
            tracing::info!(pool_url = %state.pool_config.pool_url, "updated farmer record at pool");
        }
        Ok(PutFarmerOutcome::Error(error)) => {
            tracing::warn!(
                pool_url = %state.pool_config.pool_url,
                error_code = http::error_code_name(error.error_code),
                "put_farmer update was rejected"
            );
            state
                .counters
                .pool_errors_24h
                .record(now, Some(u8::from(error.error_code)), error.error_message.unwrap_or_default());
        }
        Err(error) => {
            tracing::warn!(pool_url = %state.pool_config.pool_url, %error, "put_farmer request failed");
            state.counters.pool_errors_24h.record(now, None, error.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use farmer_protocol::{ErrorResponse, GetFarmerResponse, PoolInfoResponse};
    use std::sync::Mutex;

    fn sample_pool_config(pool_url: &str) -> PoolWalletConfig {
        PoolWalletConfig {
            launcher_id: [1u8; 32],
            pool_url: pool_url.to_string(),
            target_puzzle_hash: [2u8; 32],
            payout_instructions: "xch1...".to_string(),
            owner_public_key: SecretKey::from_seed(&[9u8; 32]).public_key().to_bytes(),
            p2_singleton_puzzle_hash: [3u8; 32],
        }
    }

    fn sample_keys() -> PoolKeys {
        let owner_sk = SecretKey::from_seed(&[9u8; 32]);
        let authentication_sk = SecretKey::from_seed(&[10u8; 32]);
        let authentication_pk = authentication_sk.public_key();
        PoolKeys {
            authentication_sk,
            authentication_pk,
            owner_sk,
        }
    }

    #[derive(Default)]
    struct FakePoolHttp {
        pool_info: Option<PoolInfoOutcomeFixture>,
        farmer_outcome: Mutex<Option<GetFarmerOutcome>>,
        posts: Mutex<Vec<PostFarmerRequest>>,
        puts: Mutex<Vec<PutFarmerRequest>>,
    }

    #[derive(Clone)]
    struct PoolInfoOutcomeFixture {
        authentication_token_timeout: u8,
        minimum_difficulty: u64,
    }

    #[async_trait]
    impl PoolHttp for FakePoolHttp {
        async fn get_pool_info(&self, _pool_url: &str) -> Result<crate::http::PoolInfoOutcome, crate::error::PoolHttpError> {
            let fixture = self.pool_info.clone().expect("test must configure pool_info");
            Ok(crate::http::PoolInfoOutcome {
                body: PoolInfoResponse {
                    authentication_token_timeout: fixture.authentication_token_timeout,
                    minimum_difficulty: fixture.minimum_difficulty,
                    extra: Default::default(),
                },
                final_url: "https://pool.example/pool_info".to_string(),
                redirect_statuses: Vec::new(),
            })
        }

        async fn get_farmer(&self, _params: GetFarmerParams<'_>) -> Result<GetFarmerOutcome, crate::error::PoolHttpError> {
            Ok(self
                .farmer_outcome
                .lock()
                .unwrap()
                .clone()
                .expect("test must configure get_farmer outcome"))
        }

        async fn post_farmer(
            &self,
            _pool_url: &str,
            request: &PostFarmerRequest,
        ) -> Result<PostFarmerOutcome, crate::error::PoolHttpError> {
            self.posts.lock().unwrap().push(request.clone());
            *self.farmer_outcome.lock().unwrap() = Some(GetFarmerOutcome::Success(GetFarmerResponse {
                current_difficulty: 5,
                current_points: 0,
                payout_instructions: request.payload.payout_instructions.clone(),
            }));
            Ok(PostFarmerOutcome::Success(farmer_protocol::PostFarmerResponse {
                welcome_message: "welcome".to_string(),
            }))
        }

        async fn put_farmer(
            &self,
            _pool_url: &str,
            request: &PutFarmerRequest,
        ) -> Result<PutFarmerOutcome, crate::error::PoolHttpError> {
            self.puts.lock().unwrap().push(request.clone());
            Ok(PutFarmerOutcome::Success)
        }
    }

    #[tokio::test]
    async fn self_pooling_state_never_contacts_the_pool() {
        let mut state = PoolState::new(sample_pool_config(""));
        let http = FakePoolHttp::default();
        update_pool_state(&mut state, &http, &sample_keys(), "xch1...", true, 1_000).await;
        assert!(state.authentication_token_timeout.is_none());
    }

    #[tokio::test]
    async fn mainnet_guard_rejects_non_https_pool_url() {
        let mut state = PoolState::new(sample_pool_config("http://pool.example"));
        let http = FakePoolHttp::default();
        update_pool_state(&mut state, &http, &sample_keys(), "xch1...", true, 1_000).await;
        assert_eq!(state.counters.pool_errors_24h.window().len(), 1);
        assert!(state.authentication_token_timeout.is_none());
    }

    #[tokio::test]
    async fn pool_info_refresh_seeds_difficulty_only_once() {
        let mut state = PoolState::new(sample_pool_config("https://pool.example"));
        state.current_difficulty = Some(42);
        let http = FakePoolHttp {
            pool_info: Some(PoolInfoOutcomeFixture {
                authentication_token_timeout: 5,
                minimum_difficulty: 1,
            }),
            ..Default::default()
        };
        update_pool_state(&mut state, &http, &sample_keys(), "xch1...", true, 0).await;
        assert_eq!(state.authentication_token_timeout, Some(5));
        assert_eq!(state.current_difficulty, Some(42));
    }

    #[tokio::test]
    async fn farmer_not_known_triggers_registration() {
        let mut state = PoolState::new(sample_pool_config("https://pool.example"));
        state.authentication_token_timeout = Some(5);
        let http = FakePoolHttp {
            pool_info: Some(PoolInfoOutcomeFixture {
                authentication_token_timeout: 5,
                minimum_difficulty: 1,
            }),
            farmer_outcome: Mutex::new(Some(GetFarmerOutcome::Error(ErrorResponse {
                error_code: PoolErrorCode::FarmerNotKnown,
                error_message: None,
            }))),
            ..Default::default()
        };
        update_pool_state(&mut state, &http, &sample_keys(), "xch1...", true, 10_000).await;
        assert_eq!(http.posts.lock().unwrap().len(), 1);
        assert_eq!(state.current_difficulty, Some(5));
    }

    #[test]
    fn record_points_found_uses_current_difficulty() {
        let mut state = PoolState::new(sample_pool_config("https://pool.example"));
        state.current_difficulty = Some(7);
        state.record_points_found(1_000);
        let window = state.counters.points_found_24h.window();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0], (1_000, 7));
    }

    #[tokio::test]
    async fn payout_instructions_mismatch_triggers_put() {
        let mut state = PoolState::new(sample_pool_config("https://pool.example"));
        state.authentication_token_timeout = Some(5);
        let http = FakePoolHttp {
            farmer_outcome: Mutex::new(Some(GetFarmerOutcome::Success(GetFarmerResponse {
                current_difficulty: 5,
                current_points: 0,
                payout_instructions: "xch1different".to_string(),
            }))),
            ..Default::default()
        };
        update_pool_state(&mut state, &http, &sample_keys(), "xch1mine", true, 10_000).await;
        assert_eq!(http.puts.lock().unwrap().len(), 1);
    }
}
