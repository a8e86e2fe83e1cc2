//! Ordered classification rules: RemoteFailure -> (category, severity, recoverability).

use super::failure::RemoteFailure;
use super::report::{ErrorCategory, ErrorReport, ErrorSeverity};

/// Classify a failure into the fixed taxonomy.
///
/// Total and deterministic: the same failure always yields the same category,
/// severity, and recoverability. Unrecognized inputs fall through to
/// system/high, not recoverable; classification itself never fails.
pub fn classify(failure: &RemoteFailure, context: &str) -> ErrorReport {
    use ErrorCategory as C;
    use ErrorSeverity as S;

    let detail = failure.to_string();
    let (category, severity, recoverable, message) = match failure {
        RemoteFailure::Offline => (C::Network, S::High, true, "No internet connection"),
        RemoteFailure::Timeout => (C::Network, S::Medium, true, "The request timed out"),
        RemoteFailure::Connection(_) => (C::Network, S::Medium, true, "Connection failed"),
        RemoteFailure::Http(status) => return classify_http(*status, detail, context),
        RemoteFailure::Decode(_) => (
            C::Validation,
            S::Medium,
            false,
            "The server response could not be read",
        ),
        RemoteFailure::Storage(_) => (
            C::Storage,
            S::Critical,
            false,
            "Saving data on this device failed",
        ),
        RemoteFailure::Cancelled => (C::User, S::Low, false, "Operation cancelled"),
        RemoteFailure::Other(_) => (C::System, S::High, false, "Something went wrong"),
    };

    ErrorReport::new(category, severity, recoverable, message, detail, context)
}

/// HTTP status sub-rules. Auth and permission statuses are not retryable
/// (repeating the call cannot change the outcome); server-side statuses are.
fn classify_http(status: u16, detail: String, context: &str) -> ErrorReport {
    use ErrorCategory as C;
    use ErrorSeverity as S;

    let (category, severity, recoverable, message) = match status {
        401 => (C::Authentication, S::High, false, "Your session has expired"),
        403 => (C::Permission, S::High, false, "You don't have access to this"),
        408 => (C::Network, S::Medium, true, "The request timed out"),
        429 | 503 => (
            C::External,
            S::Medium,
            true,
            "The service is busy, try again shortly",
        ),
        500..=599 => (
            C::External,
            S::High,
            true,
            "The service had a problem",
        ),
        400..=499 => (
            C::Validation,
            S::Medium,
            false,
            "The request was rejected",
        ),
        // 1xx/3xx should never surface as failures; file them with the
        // unrecognized bucket rather than inventing a category.
        _ => (C::System, S::High, false, "Something went wrong"),
    };

    ErrorReport::new(category, severity, recoverable, message, detail, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_is_network_high_recoverable() {
        let r = classify(&RemoteFailure::Offline, "sync");
        assert_eq!(r.category, ErrorCategory::Network);
        assert_eq!(r.severity, ErrorSeverity::High);
        assert!(r.recoverable);
        assert_eq!(r.context, "sync");
    }

    #[test]
    fn timeout_is_network_medium() {
        let r = classify(&RemoteFailure::Timeout, "fetch");
        assert_eq!(r.category, ErrorCategory::Network);
        assert_eq!(r.severity, ErrorSeverity::Medium);
        assert!(r.recoverable);
    }

    #[test]
    fn auth_statuses_not_retryable() {
        let r = classify(&RemoteFailure::Http(401), "op");
        assert_eq!(r.category, ErrorCategory::Authentication);
        assert!(!r.recoverable);

        let r = classify(&RemoteFailure::Http(403), "op");
        assert_eq!(r.category, ErrorCategory::Permission);
        assert!(!r.recoverable);
    }

    #[test]
    fn throttle_and_5xx_are_external_retryable() {
        let r = classify(&RemoteFailure::Http(429), "op");
        assert_eq!(r.category, ErrorCategory::External);
        assert_eq!(r.severity, ErrorSeverity::Medium);
        assert!(r.recoverable);

        let r = classify(&RemoteFailure::Http(500), "op");
        assert_eq!(r.category, ErrorCategory::External);
        assert_eq!(r.severity, ErrorSeverity::High);
        assert!(r.recoverable);
    }

    #[test]
    fn other_4xx_is_validation_not_retryable() {
        let r = classify(&RemoteFailure::Http(404), "op");
        assert_eq!(r.category, ErrorCategory::Validation);
        assert!(!r.recoverable);
    }

    #[test]
    fn decode_is_validation_medium() {
        let r = classify(&RemoteFailure::Decode("bad json".into()), "op");
        assert_eq!(r.category, ErrorCategory::Validation);
        assert_eq!(r.severity, ErrorSeverity::Medium);
        assert!(!r.recoverable);
    }

    #[test]
    fn unrecognized_falls_through_to_system_high() {
        let r = classify(&RemoteFailure::Other("strange".into()), "op");
        assert_eq!(r.category, ErrorCategory::System);
        assert_eq!(r.severity, ErrorSeverity::High);
        assert!(!r.recoverable);
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify(&RemoteFailure::Http(503), "op");
        let b = classify(&RemoteFailure::Http(503), "op");
        assert_eq!(a.category, b.category);
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.recoverable, b.recoverable);
        assert_eq!(a.message, b.message);
        // Ids and timestamps differ; the classification itself must not.
        assert_ne!(a.id, b.id);
    }
}
