/// Transport-level failure talking to a pool: connection, TLS or non-2xx
/// HTTP. Recorded in `pool_errors_24h`; never propagated past the single
/// pool's update iteration (spec.md §7 `TransientNetwork`).
#[derive(Debug, thiserror::Error)]
pub enum PoolHttpError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse response body from {url}: {source}")]
    InvalidBody {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
