// src/error.rs
// =============================================================================
// Typed errors for the network-facing layers (page fetching, DNS, SMTP).
//
// The binary itself uses anyhow, but the crawler and verifier need to tell
// failures apart (a timeout is logged differently from a 404, an SMTP
// connection failure means "try the next MX host"), so those layers return
// this enum instead.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    /// The seed could not be turned into a crawlable URL
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server answered, but not with a 2xx status
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Request timed out
    #[error("request to {0} timed out")]
    Timeout(String),

    /// Any other transport-level failure from reqwest
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// MX lookup failed (NXDOMAIN, timeout, server failure...)
    #[error("DNS lookup for {domain} failed: {reason}")]
    Dns { domain: String, reason: String },

    /// SMTP connection or protocol failure (no usable reply code)
    #[error("SMTP probe via {host} failed: {reason}")]
    Smtp { host: String, reason: String },

    /// A spawned task panicked or was aborted
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl HarvestError {
    /// Maps a reqwest error to a more specific variant when possible
    pub fn from_request(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            HarvestError::Timeout(url.to_string())
        } else {
            HarvestError::Request(error)
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HarvestError::HttpStatus {
            url: "https://acme.com/".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 for https://acme.com/");

        let err = HarvestError::Dns {
            domain: "acme.com".to_string(),
            reason: "no records".to_string(),
        };
        assert!(err.to_string().contains("acme.com"));
    }
}
