//! libcurl-backed probe transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::RemoteFailure;

use super::{ProbeResponse, ProbeTransport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe transport over `curl::easy`, one handle per request.
///
/// curl is a blocking API, so each request runs on the blocking pool and
/// enforces its deadline through libcurl's own timeout options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlTransport;

impl CurlTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbeTransport for CurlTransport {
    async fn get(
        &self,
        url: &str,
        max_bytes: u64,
        timeout: Duration,
    ) -> Result<ProbeResponse, RemoteFailure> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || get_blocking(&url, max_bytes, timeout))
            .await
            .map_err(|e| RemoteFailure::Other(format!("probe task failed: {e}")))?
    }

    async fn post(
        &self,
        url: &str,
        body_len: u64,
        timeout: Duration,
    ) -> Result<ProbeResponse, RemoteFailure> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || post_blocking(&url, body_len, timeout))
            .await
            .map_err(|e| RemoteFailure::Other(format!("probe task failed: {e}")))?
    }
}

/// GET with a client-side byte cap. Aborting the transfer once the cap is
/// reached surfaces as a curl write error, which counts as success here.
fn get_blocking(url: &str, max_bytes: u64, timeout: Duration) -> Result<ProbeResponse, RemoteFailure> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(map_curl_error)?;
    easy.follow_location(true).map_err(map_curl_error)?;
    easy.connect_timeout(CONNECT_TIMEOUT).map_err(map_curl_error)?;
    easy.timeout(timeout).map_err(map_curl_error)?;

    let received = std::cell::Cell::new(0u64);
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                received.set(received.get() + data.len() as u64);
                if received.get() >= max_bytes {
                    // Short write aborts the transfer.
                    Ok(0)
                } else {
                    Ok(data.len())
                }
            })
            .map_err(map_curl_error)?;
        match transfer.perform() {
            Ok(()) => {}
            Err(e) if e.is_write_error() && received.get() >= max_bytes => {}
            Err(e) => return Err(map_curl_error(e)),
        }
    }

    let status = easy.response_code().map_err(map_curl_error)? as u16;
    Ok(ProbeResponse {
        status,
        bytes_received: received.get(),
    })
}

/// POST `body_len` zero bytes, streaming the body from the read callback so
/// no buffer of that size is ever allocated.
fn post_blocking(url: &str, body_len: u64, timeout: Duration) -> Result<ProbeResponse, RemoteFailure> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(map_curl_error)?;
    easy.post(true).map_err(map_curl_error)?;
    easy.post_field_size(body_len).map_err(map_curl_error)?;
    easy.connect_timeout(CONNECT_TIMEOUT).map_err(map_curl_error)?;
    easy.timeout(timeout).map_err(map_curl_error)?;

    let mut received: u64 = 0;
    {
        let mut sent: u64 = 0;
        let mut transfer = easy.transfer();
        transfer
            .read_function(move |buf| {
                let n = body_len.saturating_sub(sent).min(buf.len() as u64) as usize;
                for b in &mut buf[..n] {
                    *b = 0;
                }
                sent += n as u64;
                Ok(n)
            })
            .map_err(map_curl_error)?;
        transfer
            .write_function(|data| {
                received += data.len() as u64;
                Ok(data.len())
            })
            .map_err(map_curl_error)?;
        transfer.perform().map_err(map_curl_error)?;
    }

    let status = easy.response_code().map_err(map_curl_error)? as u16;
    Ok(ProbeResponse {
        status,
        bytes_received: received,
    })
}

fn map_curl_error(e: curl::Error) -> RemoteFailure {
    if e.is_operation_timedout() {
        return RemoteFailure::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return RemoteFailure::Connection(e.to_string());
    }
    RemoteFailure::Other(e.to_string())
}
