//! Error types for the bog-payment library.
//!
//! This module defines every error that can occur while guarding callbacks,
//! verifying signatures, rendering responses and talking to the gateway.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Basic-auth credentials were missing or did not match
    #[error("Unauthorized")]
    Unauthorized {
        /// Realm advertised in the `WWW-Authenticate` challenge
        realm: String,
        /// Whether a challenge header should be sent (credentials were absent)
        challenge: bool,
    },

    /// The client address is not in the allow-list
    #[error("Access denied for IP: {0}")]
    Forbidden(String),

    /// The callback carried no `signature` parameter
    #[error("Signature is missing!")]
    MissingSignature,

    /// The callback signature did not verify against the gateway certificate
    #[error("Signature is invalid!")]
    InvalidSignature,

    /// The gateway replied with XML that is not well-formed
    #[error("XML string is invalid. XML Errors: {}", .0.join(", "))]
    MalformedResponse(Vec<String>),

    /// The gateway reply was well-formed but did not have the expected shape
    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),

    /// Outbound request exceeded the configured timeout
    #[error("Timeout exceeded")]
    TimeoutExceeded,

    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[source] reqwest::Error),

    /// Certificate or public key could not be loaded
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error during JSON deserialization of configuration
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error reading key material from disk
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GatewayError {
    /// Maps a transport error, keeping timeouts distinct from other failures.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::TimeoutExceeded
        } else {
            GatewayError::HttpError(err)
        }
    }

    /// Returns true for the errors the Access Guard raises.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            GatewayError::Unauthorized { .. } | GatewayError::Forbidden(_)
        )
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
