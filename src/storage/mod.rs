//! Storage layer: trait seams and the in-memory backends that implement them.

pub mod inmemory;
pub mod traits;

pub use inmemory::{MemoryBrokerStorage, MemoryServiceTokenStore};
pub use traits::{
    AuthorizationCodeStore, BrokerStorage, ClientStore, PendingFlowStore, ServiceToken,
    ServiceTokenStore,
};
