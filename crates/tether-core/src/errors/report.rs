//! Classified error records and the taxonomy they are filed under.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::unix_timestamp;

/// Fixed failure taxonomy. Assigned once at classification time, never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Authentication,
    Storage,
    Validation,
    Permission,
    System,
    External,
    User,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Permission => "permission",
            ErrorCategory::System => "system",
            ErrorCategory::External => "external",
            ErrorCategory::User => "user",
        }
    }
}

/// Severity grade, ordered: Low < Medium < High < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

/// One classified failure, as retained in the history ring.
///
/// Category, severity, and recoverability are fixed at classification time.
/// `resolved` is the only mutable field and transitions false -> true at most
/// once (see [`ErrorCenter::mark_resolved`](super::ErrorCenter::mark_resolved)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: Uuid,
    /// Unix seconds at classification time.
    pub timestamp: i64,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    /// Short user-facing description.
    pub message: String,
    /// Raw failure detail for logs and support.
    pub technical_detail: String,
    /// Caller-supplied operation label (e.g. "sync:list", "upload:42").
    pub context: String,
    /// Whether a retry is expected to plausibly succeed.
    pub recoverable: bool,
    pub resolved: bool,
}

impl ErrorReport {
    /// Build a fresh report with a new id and the current timestamp.
    pub(super) fn new(
        category: ErrorCategory,
        severity: ErrorSeverity,
        recoverable: bool,
        message: impl Into<String>,
        technical_detail: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: unix_timestamp(),
            category,
            severity,
            message: message.into(),
            technical_detail: technical_detail.into(),
            context: context.into(),
            recoverable,
            resolved: false,
        }
    }
}
