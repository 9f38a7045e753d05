//! Wire payloads shared by the consensus, harvester and pool links.
//!
//! Exact framing for the consensus and harvester links is out of scope here --
//! these are the payload shapes the farmer core builds and consumes; how they
//! are serialized onto a particular peer connection is a concern of the
//! network layer that owns that connection.

mod harvester;
mod hex_bytes;
mod pool;
mod proof_of_space;
mod signage_point;

pub use harvester::{
    FeeInfo, HarvesterHandshake, NewProofOfSpace, NewSignagePointHarvester, PoolDifficulty,
    RequestSignatures, RespondSignatures,
};
pub use pool::{
    AuthenticationPayload, ErrorResponse, GetFarmerResponse, PoolErrorCode, PoolInfoResponse,
    PostFarmerPayload, PostFarmerRequest, PostFarmerResponse, PutFarmerPayload, PutFarmerRequest,
};
pub use proof_of_space::{ProofOfSpace, ProtocolInvariantError};
pub use signage_point::SignagePoint;
