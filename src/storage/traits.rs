//! Storage trait definitions for broker flow state and delegated credentials.
//!
//! All broker state (clients, pending flows, authorization codes) is
//! process-owned and ephemeral by design: losing it on restart only forces
//! clients to re-register via DCR and users to restart an in-flight login.
//! The traits exist so tests use the in-process map and a deployment could
//! swap in a distributed cache without touching protocol logic.

use crate::errors::StorageError;
use crate::oauth::types::{AuthorizationCode, ClientRegistration, PendingDownstreamFlow, PendingIdentityFlow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing dynamically registered OAuth clients
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Store a new client registration
    async fn store_client(&self, client: &ClientRegistration) -> Result<()>;

    /// Retrieve a client by ID
    async fn get_client(&self, client_id: &str) -> Result<Option<ClientRegistration>>;
}

/// Trait for storing issued authorization codes
#[async_trait]
pub trait AuthorizationCodeStore: Send + Sync {
    /// Store a new authorization code
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Retrieve and delete an authorization code in one critical section.
    ///
    /// A second call for the same code must observe "not found"; expiry is
    /// left to the caller so an expired code yields a distinct error.
    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Drop expired codes, returning how many were removed
    async fn cleanup_expired_codes(&self) -> Result<usize>;
}

/// Trait for storing in-flight authorization state keyed by opaque state
/// tokens. Consume operations delete on read; an unknown or expired state is
/// reported as absent, never inferred.
#[async_trait]
pub trait PendingFlowStore: Send + Sync {
    /// Park a flow awaiting the identity provider callback
    async fn store_identity_flow(&self, state: &str, flow: &PendingIdentityFlow) -> Result<()>;

    /// Retrieve and delete an identity flow in one critical section
    async fn consume_identity_flow(&self, state: &str) -> Result<Option<PendingIdentityFlow>>;

    /// Park a flow awaiting the downstream provider callback
    async fn store_downstream_flow(
        &self,
        state: &str,
        flow: &PendingDownstreamFlow,
    ) -> Result<()>;

    /// Retrieve and delete a downstream flow in one critical section
    async fn consume_downstream_flow(
        &self,
        state: &str,
    ) -> Result<Option<PendingDownstreamFlow>>;

    /// Drop expired flows of both kinds, returning how many were removed
    async fn cleanup_expired_flows(&self) -> Result<usize>;
}

/// Combined broker storage trait
pub trait BrokerStorage: ClientStore + AuthorizationCodeStore + PendingFlowStore {}

/// Delegated credential for the downstream provider, persisted per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token, seconds since epoch
    pub expires_at: i64,
    /// Last write, milliseconds since epoch
    pub updated_at: i64,
}

/// External per-user, per-service credential store (token persistence
/// collaborator). Implementations are expected to be independently safe for
/// concurrent per-key access; the broker adds no locking of its own.
#[async_trait]
pub trait ServiceTokenStore: Send + Sync {
    /// Look up the stored credential for (email, service)
    async fn get_token(&self, email: &str, service: &str) -> Result<Option<ServiceToken>>;

    /// Store or overwrite the credential for (email, service)
    async fn save_token(&self, email: &str, service: &str, token: ServiceToken) -> Result<()>;

    /// Remove the credential for (email, service)
    async fn delete_token(&self, email: &str, service: &str) -> Result<()>;
}
