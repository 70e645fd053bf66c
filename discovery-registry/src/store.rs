//! Pluggable, best-effort persistence hook (spec.md §4.1, §6).
//!
//! `Save`/`Delete` are invoked after a successful in-memory mutation;
//! failures are logged and do not roll back the mutation. No backend is
//! shipped here — durable persistence is explicitly out of scope
//! (spec.md §1 Non-goals) — only the interface and a no-op default.

use async_trait::async_trait;
use discovery_core::{AgentId, AgentInfo};
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a [`RegistryStore`] backend may report. The registry logs
/// these and otherwise ignores them (spec.md §7: "persistence errors
/// are logged and swallowed").
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested agent is not present in the backend.
    #[error("agent not found in store: {0}")]
    NotFound(String),
    /// The backend failed for an implementation-specific reason.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Trait implemented by optional persistence backends.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Persists (inserts or replaces) an agent record.
    async fn save(&self, agent: &AgentInfo) -> StoreResult<()>;

    /// Loads a single agent record.
    async fn load(&self, id: &AgentId) -> StoreResult<AgentInfo>;

    /// Loads every agent record known to the backend.
    async fn load_all(&self) -> StoreResult<Vec<AgentInfo>>;

    /// Deletes an agent record.
    async fn delete(&self, id: &AgentId) -> StoreResult<()>;
}

/// A [`RegistryStore`] that performs no persistence at all; the default
/// when no backend is configured.
#[derive(Debug, Default)]
pub struct NullStore;

#[async_trait]
impl RegistryStore for NullStore {
    async fn save(&self, _agent: &AgentInfo) -> StoreResult<()> {
        Ok(())
    }

    async fn load(&self, id: &AgentId) -> StoreResult<AgentInfo> {
        Err(StoreError::NotFound(id.to_string()))
    }

    async fn load_all(&self) -> StoreResult<Vec<AgentInfo>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &AgentId) -> StoreResult<()> {
        Ok(())
    }
}
