//! Chained OAuth 2.1 authorization server modules.

pub mod auth_server;
pub mod jwt;
pub mod pkce;
pub mod types;

pub use auth_server::AuthorizationServer;
