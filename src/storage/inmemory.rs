//! In-memory storage implementations.
//!
//! Each map operation is a single get/set/remove under one mutex, which
//! makes the read-validate-delete sequence for single-use artifacts atomic
//! with respect to concurrent requests for the same key.

use crate::errors::StorageError;
use crate::oauth::types::{AuthorizationCode, ClientRegistration, PendingDownstreamFlow, PendingIdentityFlow};
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory broker storage
#[derive(Default)]
pub struct MemoryBrokerStorage {
    clients: Mutex<HashMap<String, ClientRegistration>>,
    auth_codes: Mutex<HashMap<String, AuthorizationCode>>,
    identity_flows: Mutex<HashMap<String, PendingIdentityFlow>>,
    downstream_flows: Mutex<HashMap<String, PendingDownstreamFlow>>,
}

impl MemoryBrokerStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::LockFailed(e.to_string())
}

#[async_trait]
impl ClientStore for MemoryBrokerStorage {
    async fn store_client(&self, client: &ClientRegistration) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_err)?;
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<ClientRegistration>> {
        let clients = self.clients.lock().map_err(lock_err)?;
        Ok(clients.get(client_id).cloned())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryBrokerStorage {
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()> {
        let mut codes = self.auth_codes.lock().map_err(lock_err)?;
        codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        let mut codes = self.auth_codes.lock().map_err(lock_err)?;
        Ok(codes.remove(code))
    }

    async fn cleanup_expired_codes(&self) -> Result<usize> {
        let mut codes = self.auth_codes.lock().map_err(lock_err)?;
        let now = Utc::now();
        let initial_count = codes.len();
        codes.retain(|_, code| code.expires_at > now);
        Ok(initial_count - codes.len())
    }
}

#[async_trait]
impl PendingFlowStore for MemoryBrokerStorage {
    async fn store_identity_flow(&self, state: &str, flow: &PendingIdentityFlow) -> Result<()> {
        let mut flows = self.identity_flows.lock().map_err(lock_err)?;
        flows.insert(state.to_string(), flow.clone());
        Ok(())
    }

    async fn consume_identity_flow(&self, state: &str) -> Result<Option<PendingIdentityFlow>> {
        let mut flows = self.identity_flows.lock().map_err(lock_err)?;
        // An expired flow is indistinguishable from one that never existed
        Ok(flows.remove(state).filter(|flow| flow.expires_at > Utc::now()))
    }

    async fn store_downstream_flow(
        &self,
        state: &str,
        flow: &PendingDownstreamFlow,
    ) -> Result<()> {
        let mut flows = self.downstream_flows.lock().map_err(lock_err)?;
        flows.insert(state.to_string(), flow.clone());
        Ok(())
    }

    async fn consume_downstream_flow(
        &self,
        state: &str,
    ) -> Result<Option<PendingDownstreamFlow>> {
        let mut flows = self.downstream_flows.lock().map_err(lock_err)?;
        Ok(flows.remove(state).filter(|flow| flow.expires_at > Utc::now()))
    }

    async fn cleanup_expired_flows(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        {
            let mut flows = self.identity_flows.lock().map_err(lock_err)?;
            let before = flows.len();
            flows.retain(|_, flow| flow.expires_at > now);
            removed += before - flows.len();
        }
        {
            let mut flows = self.downstream_flows.lock().map_err(lock_err)?;
            let before = flows.len();
            flows.retain(|_, flow| flow.expires_at > now);
            removed += before - flows.len();
        }
        Ok(removed)
    }
}

impl BrokerStorage for MemoryBrokerStorage {}

/// In-memory service token store, keyed by (email, service)
#[derive(Default)]
pub struct MemoryServiceTokenStore {
    tokens: Mutex<HashMap<(String, String), ServiceToken>>,
}

impl MemoryServiceTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceTokenStore for MemoryServiceTokenStore {
    async fn get_token(&self, email: &str, service: &str) -> Result<Option<ServiceToken>> {
        let tokens = self.tokens.lock().map_err(lock_err)?;
        Ok(tokens.get(&(email.to_string(), service.to_string())).cloned())
    }

    async fn save_token(&self, email: &str, service: &str, token: ServiceToken) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        tokens.insert((email.to_string(), service.to_string()), token);
        Ok(())
    }

    async fn delete_token(&self, email: &str, service: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        tokens.remove(&(email.to_string(), service.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_code(code: &str, ttl_secs: i64) -> AuthorizationCode {
        AuthorizationCode {
            code: code.to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            code_challenge: "challenge".to_string(),
            code_challenge_method: "S256".to_string(),
            email: "user@example.com".to_string(),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    fn test_identity_flow(ttl_secs: i64) -> PendingIdentityFlow {
        PendingIdentityFlow {
            client_id: "client-1".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            code_challenge: "challenge".to_string(),
            code_challenge_method: "S256".to_string(),
            original_state: "client-state".to_string(),
            scope: "api".to_string(),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn test_code_consume_is_single_use() {
        let storage = MemoryBrokerStorage::new();
        storage.store_code(&test_code("abc", 300)).await.unwrap();

        let first = storage.consume_code("abc").await.unwrap();
        assert!(first.is_some());

        let second = storage.consume_code("abc").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_expired_code_still_returned_for_distinct_error() {
        // Expiry is the caller's check so the token endpoint can report
        // "expired" rather than "unknown"; the entry is removed either way.
        let storage = MemoryBrokerStorage::new();
        storage.store_code(&test_code("old", -10)).await.unwrap();

        let consumed = storage.consume_code("old").await.unwrap().unwrap();
        assert!(consumed.expires_at < Utc::now());
        assert!(storage.consume_code("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_flow_consume_is_single_use() {
        let storage = MemoryBrokerStorage::new();
        storage
            .store_identity_flow("state-1", &test_identity_flow(600))
            .await
            .unwrap();

        assert!(storage.consume_identity_flow("state-1").await.unwrap().is_some());
        assert!(storage.consume_identity_flow("state-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_flow_reads_as_absent() {
        let storage = MemoryBrokerStorage::new();
        storage
            .store_identity_flow("stale", &test_identity_flow(-5))
            .await
            .unwrap();

        assert!(storage.consume_identity_flow("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_reads_as_absent() {
        let storage = MemoryBrokerStorage::new();
        assert!(storage.consume_identity_flow("never-stored").await.unwrap().is_none());
        assert!(storage.consume_downstream_flow("never-stored").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_entries() {
        let storage = MemoryBrokerStorage::new();
        storage.store_code(&test_code("live", 300)).await.unwrap();
        storage.store_code(&test_code("dead", -10)).await.unwrap();
        storage
            .store_identity_flow("live-flow", &test_identity_flow(600))
            .await
            .unwrap();
        storage
            .store_identity_flow("dead-flow", &test_identity_flow(-5))
            .await
            .unwrap();

        assert_eq!(storage.cleanup_expired_codes().await.unwrap(), 1);
        assert_eq!(storage.cleanup_expired_flows().await.unwrap(), 1);
        assert!(storage.consume_code("live").await.unwrap().is_some());
        assert!(storage.consume_identity_flow("live-flow").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_service_token_store_round_trip() {
        let store = MemoryServiceTokenStore::new();
        assert!(store.get_token("user@example.com", "api").await.unwrap().is_none());

        let token = ServiceToken {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
            updated_at: Utc::now().timestamp_millis(),
        };
        store.save_token("user@example.com", "api", token).await.unwrap();

        let found = store.get_token("user@example.com", "api").await.unwrap().unwrap();
        assert_eq!(found.access_token, "at");

        // Saving again overwrites
        let newer = ServiceToken {
            access_token: "at2".to_string(),
            refresh_token: "rt2".to_string(),
            expires_at: Utc::now().timestamp() + 7200,
            updated_at: Utc::now().timestamp_millis(),
        };
        store.save_token("user@example.com", "api", newer).await.unwrap();
        let found = store.get_token("user@example.com", "api").await.unwrap().unwrap();
        assert_eq!(found.access_token, "at2");

        store.delete_token("user@example.com", "api").await.unwrap();
        assert!(store.get_token("user@example.com", "api").await.unwrap().is_none());
    }
}
