//! Chained OAuth 2.1 identity broker (cob) library crate.
//!
//! Provides an OAuth 2.1 authorization server (RFC 8414 metadata, dynamic
//! client registration, PKCE, HMAC-signed tokens) that brokers identity
//! through an external identity provider and, when configured, chains to a
//! second downstream OAuth provider to obtain delegated API credentials.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
