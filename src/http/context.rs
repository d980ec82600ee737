//! Application state shared across request handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::oauth::AuthorizationServer;
use crate::storage::BrokerStorage;

#[derive(Clone)]
pub struct AppContext {
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
    /// Chained OAuth broker backing every protocol endpoint
    pub auth_server: Arc<AuthorizationServer>,
    /// Broker storage, shared with the background expiry sweep
    pub storage: Arc<dyn BrokerStorage>,
}
