//! The failure type remote operations hand to classification.

use thiserror::Error;

/// Failure of a remote operation, as reported by the caller's transport or
/// decoding layer. This is the input to [`classify`](super::classify); the
/// variants intentionally describe transport-level symptoms, not domain
/// errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteFailure {
    /// No network path was available when the operation ran.
    #[error("no network connectivity")]
    Offline,
    /// The operation exceeded its transport deadline.
    #[error("operation timed out")]
    Timeout,
    /// Connection-level failure (reset, DNS, TLS handshake, etc.).
    #[error("connection failed: {0}")]
    Connection(String),
    /// The server answered with a non-success HTTP status.
    #[error("HTTP {0}")]
    Http(u16),
    /// The response arrived but could not be decoded.
    #[error("response decoding failed: {0}")]
    Decode(String),
    /// A local persistence operation failed (device database/filesystem).
    #[error("local storage failure: {0}")]
    Storage(String),
    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
    /// Anything the taxonomy does not recognize.
    #[error("{0}")]
    Other(String),
}
