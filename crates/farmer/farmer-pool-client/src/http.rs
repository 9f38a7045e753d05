//! The pool HTTP surface (spec.md §6), abstracted behind a trait so the
//! state machine in [`crate::state`] can be tested without a network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use farmer_protocol::{
    ErrorResponse, GetFarmerResponse, PoolErrorCode, PoolInfoResponse, PostFarmerRequest,
    PostFarmerResponse, PutFarmerRequest,
};
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::error::PoolHttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetFarmerParams<'a> {
    pub launcher_id: [u8; 32],
    pub authentication_token: u64,
    pub signature: [u8; 96],
    pub pool_url: &'a str,
}

/// `GET /pool_info`, plus the redirect chain's status codes so the caller
/// can decide whether to persist a new canonical pool URL (spec.md §4.4(a):
/// only an all-permanent-redirect chain, 301/308, qualifies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfoOutcome {
    pub body: PoolInfoResponse,
    pub final_url: String,
    pub redirect_statuses: Vec<u16>,
}

impl PoolInfoOutcome {
    /// The new canonical pool URL (with `/pool_info` stripped), if every hop
    /// in the redirect chain was a permanent redirect (301 or 308).
    #[must_use]
    pub fn new_pool_url(&self) -> Option<String> {
        if self.redirect_statuses.is_empty() {
            return None;
        }
        let all_permanent = self
            .redirect_statuses
            .iter()
            .all(|&status| status == 301 || status == 308);
        if !all_permanent {
            return None;
        }
        Some(self.final_url.trim_end_matches("/pool_info").to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetFarmerOutcome {
    Success(GetFarmerResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFarmerOutcome {
    Success(PostFarmerResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutFarmerOutcome {
    Success,
    Error(ErrorResponse),
}

/// The pool HTTP surface. A trait boundary so tests can substitute a fake
/// without a network (spec.md §7's propagation policy -- failures in one
/// pool call never affect another -- is enforced by the caller in
/// [`crate::state`], not here).
#[async_trait]
pub trait PoolHttp: Send + Sync {
    async fn get_pool_info(&self, pool_url: &str) -> Result<PoolInfoOutcome, PoolHttpError>;
    async fn get_farmer(&self, params: GetFarmerParams<'_>) -> Result<GetFarmerOutcome, PoolHttpError>;
    async fn post_farmer(
        &self,
        pool_url: &str,
        request: &PostFarmerRequest,
    ) -> Result<PostFarmerOutcome, PoolHttpError>;
    async fn put_farmer(
        &self,
        pool_url: &str,
        request: &PutFarmerRequest,
    ) -> Result<PutFarmerOutcome, PoolHttpError>;
}

/// A real pool client, backed by `reqwest` over rustls (TLS validated
/// against the bundled webpki root set, per spec.md §4.4).
#[derive(Debug, Clone)]
pub struct ReqwestPoolHttp {
    client: Client,
}

impl ReqwestPoolHttp {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .build()
                .expect("default reqwest client configuration is always valid"),
        }
    }
}

impl Default for ReqwestPoolHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PoolHttp for ReqwestPoolHttp {
    async fn get_pool_info(&self, pool_url: &str) -> Result<PoolInfoOutcome, PoolHttpError> {
        let url = format!("{pool_url}/pool_info");
        let redirect_statuses: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&redirect_statuses);

        // A dedicated client per call: the redirect policy closure needs to
        // capture this call's own recorder, and `/pool_info` is only polled
        // hourly so the extra client construction is not a hot path.
        let client = Client::builder()
            .redirect(Policy::custom(move |attempt| {
                recorder.lock().unwrap().push(attempt.status().as_u16());
                if attempt.previous().len() >= 10 {
                    attempt.error("too many redirects")
                } else {
                    attempt.follow()
                }
            }))
            .build()
            .map_err(|source| PoolHttpError::Request {
                url: url.clone(),
                source,
            })?;

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|source| PoolHttpError::Request {
                url: url.clone(),
                source,
            })?;

        let final_url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            return Err(PoolHttpError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body: PoolInfoResponse = response
            .json()
            .await
            .map_err(|source| PoolHttpError::Request { url: url.clone(), source })?;

        Ok(PoolInfoOutcome {
            body,
            final_url,
            redirect_statuses: redirect_statuses.lock().unwrap().clone(),
        })
    }

    async fn get_farmer(&self, params: GetFarmerParams<'_>) -> Result<GetFarmerOutcome, PoolHttpError> {
        let url = format!("{}/farmer", params.pool_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("launcher_id", hex::encode(params.launcher_id)),
                ("authentication_token", params.authentication_token.to_string()),
                ("signature", hex::encode(params.signature)),
            ])
            .send()
            .await
            .map_err(|source| PoolHttpError::Request { url: url.clone(), source })?;

        parse_farmer_response(url, response).await
    }

    async fn post_farmer(
        &self,
        pool_url: &str,
        request: &PostFarmerRequest,
    ) -> Result<PostFarmerOutcome, PoolHttpError> {
        let url = format!("{pool_url}/farmer");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| PoolHttpError::Request { url: url.clone(), source })?;

        let status = response.status();
        let text = response_text(&url, response).await?;
        if let Ok(error) = serde_json::from_str::<ErrorResponse>(&text) {
            return Ok(PostFarmerOutcome::Error(error));
        }
        if !status.is_success() {
            return Err(PoolHttpError::Status { url, status: status.as_u16() });
        }
        let body = serde_json::from_str(&text).map_err(|source| PoolHttpError::InvalidBody { url, source })?;
        Ok(PostFarmerOutcome::Success(body))
    }

    async fn put_farmer(
        &self,
        pool_url: &str,
        request: &PutFarmerRequest,
    ) -> Result<PutFarmerOutcome, PoolHttpError> {
        let url = format!("{pool_url}/farmer");
        let response = self
            .client
            .put(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| PoolHttpError::Request { url: url.clone(), source })?;

        let status = response.status();
        let text = response_text(&url, response).await?;
        if let Ok(error) = serde_json::from_str::<ErrorResponse>(&text) {
            return Ok(PutFarmerOutcome::Error(error));
        }
        if !status.is_success() {
            return Err(PoolHttpError::Status { url, status: status.as_u16() });
        }
        Ok(PutFarmerOutcome::Success)
    }
}

async fn response_text(url: &str, response: reqwest::Response) -> Result<String, PoolHttpError> {
    response.text().await.map_err(|source| PoolHttpError::Request {
        url: url.to_string(),
        source,
    })
}

async fn parse_farmer_response(url: String, response: reqwest::Response) -> Result<GetFarmerOutcome, PoolHttpError> {
    let status = response.status();
    let text = response_text(&url, response).await?;

    // A pool error can legally arrive inside a 2xx body (spec.md §7
    // PoolProtocol), so the error shape is tried before bailing on status.
    if let Ok(error) = serde_json::from_str::<ErrorResponse>(&text) {
        return Ok(GetFarmerOutcome::Error(error));
    }
    if !status.is_success() {
        return Err(PoolHttpError::Status {
            url,
            status: status.as_u16(),
        });
    }
    let body = serde_json::from_str(&text).map_err(|source| PoolHttpError::InvalidBody { url, source })?;
    Ok(GetFarmerOutcome::Success(body))
}

pub(crate) fn error_code_name(code: PoolErrorCode) -> &'static str {
    match code {
        PoolErrorCode::RevertedSignagePoint => "reverted_signage_point",
        PoolErrorCode::TooLate => "too_late",
        PoolErrorCode::NotFound => "not_found",
        PoolErrorCode::InvalidProof => "invalid_proof",
        PoolErrorCode::ProofNotGoodEnough => "proof_not_good_enough",
        PoolErrorCode::InvalidDifficulty => "invalid_difficulty",
        PoolErrorCode::InvalidSignature => "invalid_signature",
        PoolErrorCode::FarmerNotKnown => "farmer_not_known",
        PoolErrorCode::InvalidAuthenticationToken => "invalid_authentication_token",
        PoolErrorCode::InvalidPayoutInstructions => "invalid_payout_instructions",
        PoolErrorCode::InvalidSingleton => "invalid_singleton",
        PoolErrorCode::DelayBeforeSyncing => "delay_before_syncing",
        PoolErrorCode::RequestFailed => "request_failed",
    }
}
