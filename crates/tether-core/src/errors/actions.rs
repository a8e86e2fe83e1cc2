//! Recovery actions and presentation policy for classified failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::report::{ErrorCategory, ErrorReport, ErrorSeverity};

/// Actions the UI layer can offer next to a surfaced failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    Refresh,
    LogIn,
    OpenSettings,
    Restart,
    ContactSupport,
    Dismiss,
}

/// How a recorded failure should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Show briefly and auto-dismiss after the delay (low severity only).
    Transient { dismiss_after: Duration },
    /// Stays visible until the user dismisses it or picks an action.
    Sticky { actions: Vec<RecoveryAction> },
}

/// Deterministic category -> action-set mapping.
///
/// Ordering is fixed: retry (when recoverable), then the category-specific
/// action, then contact-support (severity >= High), then dismiss. The UI
/// renders them in this order.
pub fn available_actions(report: &ErrorReport) -> Vec<RecoveryAction> {
    let mut actions = Vec::with_capacity(4);
    if report.recoverable {
        actions.push(RecoveryAction::Retry);
    }
    match report.category {
        ErrorCategory::Network => actions.push(RecoveryAction::Refresh),
        ErrorCategory::Authentication => actions.push(RecoveryAction::LogIn),
        ErrorCategory::Permission => actions.push(RecoveryAction::OpenSettings),
        ErrorCategory::System => actions.push(RecoveryAction::Restart),
        ErrorCategory::Storage
        | ErrorCategory::Validation
        | ErrorCategory::External
        | ErrorCategory::User => {}
    }
    if report.severity >= ErrorSeverity::High {
        actions.push(RecoveryAction::ContactSupport);
    }
    actions.push(RecoveryAction::Dismiss);
    actions
}
