//! Failure classification and bounded, persisted error history.
//!
//! This module maps arbitrary remote-operation failures into a fixed
//! taxonomy (category + severity + recoverability), decides how the UI
//! layer should present them, and keeps a capped history ring on disk so
//! diagnostics survive restarts. Classification is total: anything
//! unrecognized lands in the system/high non-recoverable bucket instead of
//! producing a further error.

mod actions;
mod center;
mod classify;
mod failure;
mod report;

pub use actions::{available_actions, Presentation, RecoveryAction};
pub use center::{ErrorCenter, ErrorStats};
pub use classify::classify;
pub use failure::RemoteFailure;
pub use report::{ErrorCategory, ErrorReport, ErrorSeverity};
