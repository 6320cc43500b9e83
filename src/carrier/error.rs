//! Carrier API error types.
//!
//! Distinguishes transient from permanent carrier API failures. The
//! distinction drives retry logic:
//!
//! - **Transient** errors are retriable (5xx, 429, network timeouts)
//! - **Permanent** errors are not (most 4xx, malformed responses)

use std::fmt;
use thiserror::Error;

/// The kind of carrier API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierErrorKind {
    /// Transient error: safe to retry with backoff.
    ///
    /// Examples: HTTP 5xx, HTTP 429 (rate limited), network timeouts,
    /// connection resets.
    Transient,

    /// Permanent error: retrying the same request would fail again.
    ///
    /// Examples: HTTP 4xx other than 429, authentication failures,
    /// undecodable response bodies.
    Permanent,
}

impl CarrierErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, CarrierErrorKind::Transient)
    }
}

/// A carrier API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct CarrierApiError {
    pub kind: CarrierErrorKind,

    /// The HTTP status code, if the request got far enough to have one.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for CarrierApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "carrier API error (HTTP {}): {}", code, self.message),
            None => write!(f, "carrier API error: {}", self.message),
        }
    }
}

impl CarrierApiError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: CarrierErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: CarrierErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Classifies an HTTP status code returned by the carrier.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = if status >= 500 || status == 429 {
            CarrierErrorKind::Transient
        } else {
            CarrierErrorKind::Permanent
        };
        Self {
            kind,
            status_code: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Classifies a reqwest transport error. Connect and timeout failures are
    /// transient; everything else (builder misuse, body decode) is permanent.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            CarrierErrorKind::Transient
        } else {
            CarrierErrorKind::Permanent
        };
        Self {
            kind,
            status_code: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            CarrierApiError::from_status(500, "boom").kind,
            CarrierErrorKind::Transient
        );
        assert_eq!(
            CarrierApiError::from_status(503, "unavailable").kind,
            CarrierErrorKind::Transient
        );
    }

    #[test]
    fn rate_limit_is_transient() {
        assert_eq!(
            CarrierApiError::from_status(429, "slow down").kind,
            CarrierErrorKind::Transient
        );
    }

    #[test]
    fn client_errors_are_permanent() {
        assert_eq!(
            CarrierApiError::from_status(404, "not found").kind,
            CarrierErrorKind::Permanent
        );
        assert_eq!(
            CarrierApiError::from_status(401, "unauthorized").kind,
            CarrierErrorKind::Permanent
        );
    }

    #[test]
    fn retriability_follows_kind() {
        assert!(CarrierApiError::transient("timeout").is_retriable());
        assert!(!CarrierApiError::permanent("bad request").is_retriable());
        assert!(CarrierApiError::from_status(429, "slow down").is_retriable());
        assert!(!CarrierApiError::from_status(404, "not found").is_retriable());
    }

    #[test]
    fn display_includes_status_code_when_present() {
        let err = CarrierApiError::from_status(503, "unavailable");
        assert_eq!(err.to_string(), "carrier API error (HTTP 503): unavailable");

        let err = CarrierApiError::transient("connection reset");
        assert_eq!(err.to_string(), "carrier API error: connection reset");
    }
}
