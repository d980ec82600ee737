//! Standardized error types following the `error-cob-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-cob-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-cob-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-cob-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-cob-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when the allowed email domain list is empty
    #[error("error-cob-config-5 ALLOWED_EMAIL_DOMAINS must contain at least one domain")]
    NoAllowedDomains,

    /// Error when a URL cannot be parsed
    #[error("error-cob-config-6 Unable to parse URL '{0}': {1}")]
    UrlParsingFailed(String, url::ParseError),
}

/// OAuth protocol errors surfaced at the endpoint boundary
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Invalid client registration metadata
    #[error("error-cob-oauth-1 Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Unknown client or invalid client credentials
    #[error("error-cob-oauth-2 Invalid client: {0}")]
    InvalidClient(String),

    /// Malformed or missing required parameter
    #[error("error-cob-oauth-3 Invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported response type
    #[error("error-cob-oauth-4 Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// Unsupported grant type
    #[error("error-cob-oauth-5 Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Expired, unknown, or replayed grant material
    #[error("error-cob-oauth-6 Invalid grant: {0}")]
    InvalidGrant(String),

    /// Email domain not in the allow-list
    #[error("error-cob-oauth-7 Access denied: {0}")]
    AccessDenied(String),

    /// Identity or downstream provider exchange returned non-2xx
    #[error("error-cob-oauth-8 Upstream provider failure: {0}")]
    UpstreamFailure(String),

    /// OAuth state unknown to the flow store
    #[error("error-cob-oauth-9 Invalid or expired OAuth state")]
    InvalidState,

    /// Internal server error
    #[error("error-cob-oauth-10 Server error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// The wire-level `error` code for OAuth JSON error responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::AccessDenied(_) => "access_denied",
            Self::UpstreamFailure(_) => "upstream_failure",
            Self::InvalidState => "invalid_request",
            Self::ServerError(_) => "server_error",
        }
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when a store lock is poisoned
    #[error("error-cob-storage-1 Lock error: {0}")]
    LockFailed(String),

    /// Error when requested resource is not found
    #[error("error-cob-storage-2 Not found: {0}")]
    NotFound(String),
}
