//! Environment-based configuration types for the broker runtime settings.

use anyhow::Result;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;

/// Path where the identity provider redirects back to after login.
pub const IDENTITY_CALLBACK_PATH: &str = "/oauth/callback";

/// Path where the downstream provider redirects back to after consent.
pub const DOWNSTREAM_CALLBACK_PATH: &str = "/downstream/callback";

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// HTTP client timeout configuration
#[derive(Clone)]
pub struct HttpClientTimeout(Duration);

/// Email domains permitted to complete the identity flow
#[derive(Clone)]
pub struct AllowedEmailDomains(Vec<String>);

/// Authorization code lifetime configuration
#[derive(Clone)]
pub struct AuthCodeTtl(chrono::Duration);

/// Pending flow state lifetime configuration
#[derive(Clone)]
pub struct PendingFlowTtl(chrono::Duration);

/// Access token lifetime configuration
#[derive(Clone)]
pub struct AccessTokenTtl(chrono::Duration);

/// Refresh token lifetime configuration
#[derive(Clone)]
pub struct RefreshTokenTtl(chrono::Duration);

/// External OAuth provider endpoints and credentials.
///
/// Used for both the identity provider (first hop) and the optional
/// downstream provider (second hop).
#[derive(Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    /// Space-separated scopes requested from the provider
    pub scopes: String,
    /// Additional query parameters appended to the authorize redirect
    /// (e.g. access_type / prompt for Google)
    pub extra_authorize_params: Vec<(String, String)>,
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    /// Externally reachable base URL of this server
    pub external_base: String,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    /// HMAC-SHA256 signing secret for issued JWTs
    pub jwt_secret: String,
    /// The single capability scope this deployment grants
    pub oauth_scope: String,
    pub allowed_email_domains: AllowedEmailDomains,
    /// Identity provider (first hop, always present)
    pub identity_provider: ProviderConfig,
    /// Downstream provider (second hop, optional)
    pub downstream_provider: Option<ProviderConfig>,
    /// Service name under which downstream credentials are persisted
    pub downstream_service: String,
    pub auth_code_ttl: AuthCodeTtl,
    pub pending_flow_ttl: PendingFlowTtl,
    pub access_token_ttl: AccessTokenTtl,
    pub refresh_token_ttl: RefreshTokenTtl,
}

impl Config {
    /// Create a new configuration from environment variables.
    ///
    /// Fails fast when a required secret is absent rather than failing
    /// deep inside a request handler.
    pub fn new() -> Result<Self> {
        let version = version()?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let external_base = require_env("EXTERNAL_BASE")?;
        let default_user_agent = format!("cob/{version}");
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let jwt_secret = require_env("OAUTH_JWT_SECRET")?;
        let oauth_scope = default_env("OAUTH_SCOPE", "api");
        let allowed_email_domains: AllowedEmailDomains =
            require_env("ALLOWED_EMAIL_DOMAINS")?.try_into()?;

        let identity_provider = ProviderConfig {
            client_id: require_env("IDENTITY_CLIENT_ID")?,
            client_secret: require_env("IDENTITY_CLIENT_SECRET")?,
            authorize_url: parse_url(default_env(
                "IDENTITY_AUTHORIZE_URL",
                "https://accounts.google.com/o/oauth2/v2/auth",
            ))?,
            token_url: parse_url(default_env(
                "IDENTITY_TOKEN_URL",
                "https://oauth2.googleapis.com/token",
            ))?,
            scopes: default_env("IDENTITY_SCOPES", "openid email"),
            extra_authorize_params: parse_extra_params(default_env(
                "IDENTITY_AUTHORIZE_PARAMS",
                "access_type=online&prompt=select_account",
            )),
        };

        // The downstream hop is optional: a deployment that only brokers
        // identity leaves DOWNSTREAM_CLIENT_ID unset.
        let downstream_provider = match optional_env("DOWNSTREAM_CLIENT_ID") {
            None => None,
            Some(client_id) => Some(ProviderConfig {
                client_id,
                client_secret: require_env("DOWNSTREAM_CLIENT_SECRET")?,
                authorize_url: parse_url(require_env("DOWNSTREAM_AUTHORIZE_URL")?)?,
                token_url: parse_url(require_env("DOWNSTREAM_TOKEN_URL")?)?,
                scopes: default_env("DOWNSTREAM_SCOPES", ""),
                extra_authorize_params: parse_extra_params(default_env(
                    "DOWNSTREAM_AUTHORIZE_PARAMS",
                    "",
                )),
            }),
        };

        let downstream_service = default_env("DOWNSTREAM_SERVICE", &oauth_scope);

        let auth_code_ttl: AuthCodeTtl = default_env("AUTH_CODE_TTL", "5m").try_into()?;
        let pending_flow_ttl: PendingFlowTtl =
            default_env("PENDING_FLOW_TTL", "10m").try_into()?;
        let access_token_ttl: AccessTokenTtl =
            default_env("ACCESS_TOKEN_TTL", "1h").try_into()?;
        let refresh_token_ttl: RefreshTokenTtl =
            default_env("REFRESH_TOKEN_TTL", "30d").try_into()?;

        Ok(Self {
            version,
            http_port,
            external_base,
            user_agent,
            http_client_timeout,
            jwt_secret,
            oauth_scope,
            allowed_email_domains,
            identity_provider,
            downstream_provider,
            downstream_service,
            auth_code_ttl,
            pending_flow_ttl,
            access_token_ttl,
            refresh_token_ttl,
        })
    }

    /// The identity callback URI registered with the identity provider.
    pub fn identity_callback_uri(&self) -> String {
        format!("{}{}", self.external_base, IDENTITY_CALLBACK_PATH)
    }

    /// The downstream callback URI registered with the downstream provider.
    pub fn downstream_callback_uri(&self) -> String {
        format!("{}{}", self.external_base, DOWNSTREAM_CALLBACK_PATH)
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn parse_url(value: String) -> Result<Url> {
    Url::parse(&value).map_err(|e| ConfigError::UrlParsingFailed(value, e).into())
}

fn parse_extra_params(value: String) -> Vec<(String, String)> {
    value
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

fn parse_ttl(value: String) -> Result<chrono::Duration, ConfigError> {
    let duration = duration_str::parse(&value)
        .map_err(|e| ConfigError::DurationParsingFailed(value.clone(), e.to_string()))?;
    chrono::Duration::from_std(duration)
        .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for AllowedEmailDomains {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let domains = value
            .split(',')
            .map(|s| s.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<String>>();

        if domains.is_empty() {
            return Err(ConfigError::NoAllowedDomains.into());
        }
        Ok(Self(domains))
    }
}

impl AsRef<Vec<String>> for AllowedEmailDomains {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl AllowedEmailDomains {
    /// Whether the domain part of `email` is in the allow-list.
    pub fn permits(&self, email: &str) -> bool {
        match email.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() => {
                let domain = domain.to_ascii_lowercase();
                self.0.iter().any(|allowed| *allowed == domain)
            }
            _ => false,
        }
    }

    /// Human-readable list for the access-denied page, e.g. "@a.com / @b.com".
    pub fn display_list(&self) -> String {
        self.0
            .iter()
            .map(|d| format!("@{d}"))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

impl TryFrom<String> for AuthCodeTtl {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_ttl(value)?))
    }
}

impl AsRef<chrono::Duration> for AuthCodeTtl {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for PendingFlowTtl {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_ttl(value)?))
    }
}

impl AsRef<chrono::Duration> for PendingFlowTtl {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for AccessTokenTtl {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_ttl(value)?))
    }
}

impl AsRef<chrono::Duration> for AccessTokenTtl {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for RefreshTokenTtl {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_ttl(value)?))
    }
}

impl AsRef<chrono::Duration> for RefreshTokenTtl {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}
