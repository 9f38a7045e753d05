use farmer_pospace::std_hash;
use serde::{Deserialize, Serialize};

/// `GET /pool_info` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PoolInfoResponse {
    /// Authentication token lifetime, in minutes.
    pub authentication_token_timeout: u8,
    pub minimum_difficulty: u64,
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

/// `GET /farmer` success response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GetFarmerResponse {
    pub current_difficulty: u64,
    pub current_points: u64,
    pub payout_instructions: String,
}

/// Error codes a pool can return in a 2xx body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum PoolErrorCode {
    RevertedSignagePoint = 1,
    TooLate = 2,
    NotFound = 3,
    InvalidProof = 4,
    ProofNotGoodEnough = 5,
    InvalidDifficulty = 6,
    InvalidSignature = 7,
    FarmerNotKnown = 8,
    InvalidAuthenticationToken = 9,
    InvalidPayoutInstructions = 10,
    InvalidSingleton = 11,
    DelayBeforeSyncing = 12,
    RequestFailed = 13,
}

impl From<PoolErrorCode> for u8 {
    fn from(code: PoolErrorCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for PoolErrorCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::RevertedSignagePoint),
            2 => Ok(Self::TooLate),
            3 => Ok(Self::NotFound),
            4 => Ok(Self::InvalidProof),
            5 => Ok(Self::ProofNotGoodEnough),
            6 => Ok(Self::InvalidDifficulty),
            7 => Ok(Self::InvalidSignature),
            8 => Ok(Self::FarmerNotKnown),
            9 => Ok(Self::InvalidAuthenticationToken),
            10 => Ok(Self::InvalidPayoutInstructions),
            11 => Ok(Self::InvalidSingleton),
            12 => Ok(Self::DelayBeforeSyncing),
            13 => Ok(Self::RequestFailed),
            other => Err(format!("unknown pool error code {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error_code: PoolErrorCode,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostFarmerPayload {
    #[serde(with = "crate::hex_bytes")]
    pub launcher_id: [u8; 32],
    pub authentication_token: u64,
    #[serde(with = "crate::hex_bytes")]
    pub authentication_public_key: [u8; 48],
    pub payout_instructions: String,
    pub suggested_difficulty: Option<u64>,
}

impl PostFarmerPayload {
    /// The hash the owner key signs over, built the same way
    /// `AuthenticationPayload::hash` concatenates its fields -- there is no
    /// wire codec shared with the pool here (this is JSON, not chia's
    /// streamable format), so the payload is hashed field-by-field instead of
    /// over its JSON encoding, which would not be canonical.
    #[must_use]
    pub fn get_hash(&self) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(32 + 8 + 48 + self.payout_instructions.len() + 8);
        preimage.extend_from_slice(&self.launcher_id);
        preimage.extend_from_slice(&self.authentication_token.to_be_bytes());
        preimage.extend_from_slice(&self.authentication_public_key);
        preimage.extend_from_slice(self.payout_instructions.as_bytes());
        if let Some(difficulty) = self.suggested_difficulty {
            preimage.extend_from_slice(&difficulty.to_be_bytes());
        }
        std_hash(&preimage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostFarmerRequest {
    pub payload: PostFarmerPayload,
    #[serde(with = "crate::hex_bytes")]
    pub signature: [u8; 96],
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostFarmerResponse {
    pub welcome_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PutFarmerPayload {
    #[serde(with = "crate::hex_bytes")]
    pub launcher_id: [u8; 32],
    pub authentication_token: u64,
    pub payout_instructions: String,
    pub suggested_difficulty: Option<u64>,
}

impl PutFarmerPayload {
    /// See [`PostFarmerPayload::get_hash`] for why this is a field
    /// concatenation rather than a hash of the JSON body.
    #[must_use]
    pub fn get_hash(&self) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(32 + 8 + self.payout_instructions.len() + 8);
        preimage.extend_from_slice(&self.launcher_id);
        preimage.extend_from_slice(&self.authentication_token.to_be_bytes());
        preimage.extend_from_slice(self.payout_instructions.as_bytes());
        if let Some(difficulty) = self.suggested_difficulty {
            preimage.extend_from_slice(&difficulty.to_be_bytes());
        }
        std_hash(&preimage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PutFarmerRequest {
    pub payload: PutFarmerPayload,
    #[serde(with = "crate::hex_bytes")]
    pub signature: [u8; 96],
}

/// The payload signed (with the authentication key) for any pool request that
/// proves control of a launcher id: `H(prefix ∥ launcher_id ∥
/// target_puzzle_hash ∥ authentication_token_be)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationPayload<'a> {
    pub prefix: &'a str,
    pub launcher_id: [u8; 32],
    pub target_puzzle_hash: [u8; 32],
    pub authentication_token: u64,
}

impl AuthenticationPayload<'_> {
    #[must_use]
    pub fn hash(&self) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(self.prefix.len() + 32 + 32 + 8);
        preimage.extend_from_slice(self.prefix.as_bytes());
        preimage.extend_from_slice(&self.launcher_id);
        preimage.extend_from_slice(&self.target_puzzle_hash);
        preimage.extend_from_slice(&self.authentication_token.to_be_bytes());
        std_hash(&preimage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_payload_hash_is_deterministic() {
        let payload = AuthenticationPayload {
            prefix: "get_farmer",
            launcher_id: [1u8; 32],
            target_puzzle_hash: [2u8; 32],
            authentication_token: 12345,
        };
        assert_eq!(payload.hash(), payload.hash());

        let different_token = AuthenticationPayload {
            authentication_token: 12346,
            ..payload
        };
        assert_ne!(payload.hash(), different_token.hash());
    }

    #[test]
    fn post_farmer_request_round_trips_through_json() {
        let request = PostFarmerRequest {
            payload: PostFarmerPayload {
                launcher_id: [3u8; 32],
                authentication_token: 42,
                authentication_public_key: [4u8; 48],
                payout_instructions: "xch1...".to_string(),
                suggested_difficulty: None,
            },
            signature: [5u8; 96],
        };
        let json = serde_json::to_string(&request).unwrap();
        let decoded: PostFarmerRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, decoded);
    }
}
