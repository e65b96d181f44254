//! Error types for the mailcow API client.
//!
//! # Design
//! Construction problems (`ConfigError`) are reported before any network
//! access. Everything that can go wrong during an operation lands in
//! `ApiError`; transport failures that survive the retry policy keep the
//! last status code and body for debugging. Error bodies with a status
//! below 500 are not errors at all: mailcow reports per-item failures in
//! the JSON body, and those bodies are handed back to the caller.

use thiserror::Error;

/// Invalid or missing client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No base URL was supplied, or it was blank.
    #[error("base URL is missing")]
    MissingBaseUrl,

    /// The base URL could not be parsed.
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The base URL uses a scheme other than http or https.
    #[error("unsupported URL scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    /// A required credential was absent or blank.
    #[error("required setting `{0}` is missing")]
    MissingKey(&'static str),

    /// An optional setting carried a value that cannot be used.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// A request that never produced a usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No response was received (connection refused, DNS, timeout...).
    #[error("network error: {0}")]
    Network(String),

    /// The server kept answering with a 5xx status.
    #[error("server error HTTP {status}: {body}")]
    Server { status: u16, body: String },
}

/// Errors returned by `MailcowClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The domain name does not look like a hostname.
    #[error("invalid domain name {domain:?}")]
    Validation { domain: String },

    /// The registration checker did not confirm the domain.
    #[error("domain {domain:?} is not registered")]
    DomainNotRegistered { domain: String },

    #[error("transport failed after retries: {0}")]
    Transport(#[from] TransportError),

    /// The request payload could not be serialized to JSON.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response body was not valid JSON.
    #[error("failed to decode response body (HTTP {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// True for failures raised locally before any request was sent.
    pub fn is_rejected_locally(&self) -> bool {
        matches!(
            self,
            ApiError::Config(_) | ApiError::Validation { .. } | ApiError::DomainNotRegistered { .. }
        )
    }
}

/// Failure of a WHOIS lookup. The client treats it as "not registered".
#[derive(Debug, Error)]
pub enum WhoisError {
    #[error("whois server {server} unreachable: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("whois exchange with {server} failed: {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_includes_status_and_body() {
        let err = ApiError::from(TransportError::Server {
            status: 503,
            body: "maintenance".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "transport failed after retries: server error HTTP 503: maintenance"
        );
    }

    #[test]
    fn local_rejections_are_classified() {
        assert!(ApiError::Validation { domain: "x".into() }.is_rejected_locally());
        assert!(ApiError::from(ConfigError::MissingBaseUrl).is_rejected_locally());
        assert!(!ApiError::from(TransportError::Network("refused".into())).is_rejected_locally());
    }

    #[test]
    fn missing_key_names_the_setting() {
        assert_eq!(
            ConfigError::MissingKey("write_key").to_string(),
            "required setting `write_key` is missing"
        );
    }
}
