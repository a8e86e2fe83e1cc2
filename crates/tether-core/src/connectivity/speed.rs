use std::time::Duration;

use tokio::time::Instant;

use crate::clock::unix_timestamp;
use crate::config::ConnectivityConfig;
use crate::errors::RemoteFailure;
use crate::transport::ProbeTransport;

/// Byte caps keep probes cheap on metered links.
const DOWNLOAD_PROBE_BYTES: u64 = 1024 * 1024;
const UPLOAD_PROBE_BYTES: u64 = 256 * 1024;
const LATENCY_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one speed test. Throughput is in bits per second; a failed test
/// carries the failure in `error` with the unfinished measurements at zero.
#[derive(Debug, Clone)]
pub struct SpeedTestReport {
    pub timestamp: i64,
    pub download_bps: f64,
    pub upload_bps: f64,
    pub latency: Duration,
    pub error: Option<String>,
}

impl SpeedTestReport {
    /// All-zero report used when a test cannot run at all.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            timestamp: unix_timestamp(),
            download_bps: 0.0,
            upload_bps: 0.0,
            latency: Duration::ZERO,
            error: Some(reason.into()),
        }
    }

    pub fn download_mbps(&self) -> f64 {
        self.download_bps / 1_000_000.0
    }

    pub fn upload_mbps(&self) -> f64 {
        self.upload_bps / 1_000_000.0
    }
}

/// Coarse quality bucket derived from download throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Fair => "fair",
            QualityTier::Poor => "poor",
        }
    }
}

/// Bucket a report by its download Mbps against the configured thresholds.
/// A failed or empty report is always `Poor`.
pub fn quality_tier(cfg: &ConnectivityConfig, report: &SpeedTestReport) -> QualityTier {
    if report.error.is_some() {
        return QualityTier::Poor;
    }
    let mbps = report.download_mbps();
    if mbps >= cfg.excellent_mbps {
        QualityTier::Excellent
    } else if mbps >= cfg.good_mbps {
        QualityTier::Good
    } else if mbps >= cfg.fair_mbps {
        QualityTier::Fair
    } else {
        QualityTier::Poor
    }
}

/// Run the three probes in sequence: latency, capped download, fixed-size
/// upload. The first failure stops the sequence; what was measured so far is
/// kept and the failure is recorded on the report.
pub(super) async fn run_probes(transport: &dyn ProbeTransport, base_url: &str) -> SpeedTestReport {
    let base = base_url.trim_end_matches('/');
    let mut report = SpeedTestReport {
        timestamp: unix_timestamp(),
        download_bps: 0.0,
        upload_bps: 0.0,
        latency: Duration::ZERO,
        error: None,
    };

    let latency_url = format!("{base}/__down?bytes=0");
    let started = Instant::now();
    match checked(transport.get(&latency_url, 1024, LATENCY_TIMEOUT).await) {
        Ok(_) => report.latency = started.elapsed(),
        Err(e) => {
            report.error = Some(format!("latency probe failed: {e}"));
            return report;
        }
    }

    let download_url = format!("{base}/__down?bytes={DOWNLOAD_PROBE_BYTES}");
    let started = Instant::now();
    match checked(
        transport
            .get(&download_url, DOWNLOAD_PROBE_BYTES, PROBE_TIMEOUT)
            .await,
    ) {
        Ok(resp) => {
            report.download_bps = bits_per_sec(resp.bytes_received, started.elapsed());
        }
        Err(e) => {
            report.error = Some(format!("download probe failed: {e}"));
            return report;
        }
    }

    let upload_url = format!("{base}/__up");
    let started = Instant::now();
    match checked(
        transport
            .post(&upload_url, UPLOAD_PROBE_BYTES, PROBE_TIMEOUT)
            .await,
    ) {
        Ok(_) => {
            report.upload_bps = bits_per_sec(UPLOAD_PROBE_BYTES, started.elapsed());
        }
        Err(e) => {
            report.error = Some(format!("upload probe failed: {e}"));
        }
    }

    report
}

fn checked(
    result: Result<crate::transport::ProbeResponse, RemoteFailure>,
) -> Result<crate::transport::ProbeResponse, RemoteFailure> {
    match result {
        Ok(resp) if (200..300).contains(&resp.status) => Ok(resp),
        Ok(resp) => Err(RemoteFailure::Http(resp.status)),
        Err(e) => Err(e),
    }
}

fn bits_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    // Sub-microsecond transfers would divide by zero on a fake transport.
    (bytes as f64 * 8.0) / elapsed.as_secs_f64().max(1e-6)
}
