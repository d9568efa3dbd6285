//! Error taxonomy for the cashier client.
//!
//! Four categories cover every failure the screens have to surface:
//! transport/HTTP problems, rejected or missing credentials, local
//! validation failures (caught before any network call), and search
//! lookup misses. None of them are fatal; callers re-enter the same
//! operation after showing the message.

use reqwest::StatusCode;

/// Errors surfaced by the reconciliation and history flows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CashierError {
    /// Transport failure or a non-2xx response from the order service.
    #[error("network error: {0}")]
    Network(String),

    /// Missing session token, or the service rejected the one we sent.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A local precondition failed; the remote service was not contacted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Exact-identifier search found no matching available receipt.
    #[error("receipt #{0} not found")]
    NotFound(String),
}

impl CashierError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CashierError::Validation(_))
    }
}

/// Convert a `reqwest::Error` into a user-friendly `Network` error.
pub(crate) fn transport_error(url: &str, err: &reqwest::Error) -> CashierError {
    if err.is_connect() {
        return CashierError::Network(format!("Cannot reach order service at {url}"));
    }
    if err.is_timeout() {
        return CashierError::Network(format!("Connection to {url} timed out"));
    }
    if err.is_builder() {
        return CashierError::Network(format!("Invalid order service URL: {url}"));
    }
    CashierError::Network(format!("Network error communicating with {url}: {err}"))
}

/// Convert an HTTP status code into the matching error category.
///
/// 401/403 map to `Auth` so the shell can route to the login screen;
/// everything else non-2xx is a `Network` error with a readable message.
pub(crate) fn status_error(status: StatusCode, detail: Option<&str>) -> CashierError {
    let base = match status.as_u16() {
        401 => return CashierError::Auth("Session token is invalid or expired".into()),
        403 => return CashierError::Auth("Not authorized for this terminal".into()),
        404 => "Order service endpoint not found".to_string(),
        s if s >= 500 => format!("Order service server error (HTTP {s})"),
        s => format!("Unexpected response from order service (HTTP {s})"),
    };
    match detail {
        Some(d) if !d.trim().is_empty() => CashierError::Network(format!("{base}: {}", d.trim())),
        _ => CashierError::Network(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_auth_errors() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None),
            CashierError::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None),
            CashierError::Auth(_)
        ));
    }

    #[test]
    fn server_errors_keep_the_status_and_detail() {
        let err = status_error(StatusCode::BAD_GATEWAY, Some("upstream down"));
        match err {
            CashierError::Network(msg) => {
                assert!(msg.contains("HTTP 502"), "message was: {msg}");
                assert!(msg.contains("upstream down"), "message was: {msg}");
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn blank_detail_is_ignored() {
        let err = status_error(StatusCode::NOT_FOUND, Some("   "));
        assert_eq!(
            err,
            CashierError::Network("Order service endpoint not found".into())
        );
    }
}
