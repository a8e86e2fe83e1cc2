//! Bounded network probes.
//!
//! The connectivity monitor never talks to the application's API; it only
//! issues small, capped probe requests through this trait. Implementations
//! enforce the caller's timeout and byte caps themselves.

mod curl;

pub use self::curl::CurlTransport;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RemoteFailure;

/// Outcome of a probe request that reached the server.
#[derive(Debug, Clone, Copy)]
pub struct ProbeResponse {
    pub status: u16,
    /// Response body bytes actually read (may stop early at the byte cap).
    pub bytes_received: u64,
}

/// Transport surface for reachability and speed probes. Object safe so
/// monitors can hold a `dyn ProbeTransport` and tests can substitute a fake.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// GET `url`, reading at most `max_bytes` of the body. Stopping at the
    /// cap is a success, not an error.
    async fn get(
        &self,
        url: &str,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<ProbeResponse, RemoteFailure>;

    /// POST `body_len` opaque bytes to `url` and read the (small) response.
    async fn post(
        &self,
        url: &str,
        body_len: u64,
        timeout: Duration,
    ) -> Result<ProbeResponse, RemoteFailure>;
}
