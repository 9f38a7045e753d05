//! Per-pool state machine: `pool_info` discovery, farmer registration, and
//! the rolling counters spec.md §4.4 and §9 describe.

mod counters;
mod error;
mod http;
mod state;

pub use counters::{PoolErrorRecord, PoolErrorWindow, RollingCounter};
pub use error::PoolHttpError;
pub use http::{
    GetFarmerOutcome, GetFarmerParams, PoolHttp, PoolInfoOutcome, PostFarmerOutcome,
    PutFarmerOutcome, ReqwestPoolHttp,
};
pub use state::{update_pool_state, PoolCounters, PoolKeys, PoolState};
