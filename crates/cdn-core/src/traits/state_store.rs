// # State Store Trait
//
// Defines the interface for persisting last-applied distribution state.
//
// ## Purpose
//
// The state store is what makes redeploys idempotent: the reconciler diffs
// desired inputs against the inputs recorded here, and only talks to the
// provider when they differ.
//
// ## Implementations
//
// - Memory: `state::MemoryStateStore`
// - File: `state::FileStateStore` (JSON, atomic writes, backup recovery)
//
// ## Usage
//
// ```rust,ignore
// use cdn_core::StateStore;
//
// let store = /* StateStore implementation */;
// if let Some(state) = store.get_state("website").await? {
//     println!("deployed at {}", state.url);
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::distribution::CacheBehaviorDefaults;
use crate::origin::OriginInput;

/// Persisted state of one managed distribution
///
/// Either absent (never deployed) or fully populated. `origins`, `defaults`
/// and `comment` are the inputs as they were applied, kept verbatim for
/// diffing rather than reconstructed from provider responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionState {
    /// Distribution id
    pub id: String,
    /// Distribution ARN
    pub arn: String,
    /// Public URL, `https://<domain name>`
    pub url: String,
    /// Region the provider client was configured for
    pub region: String,
    /// Whether the distribution was last applied as enabled
    pub enabled: bool,
    /// Origins as last applied
    pub origins: Vec<OriginInput>,
    /// Cache defaults as last applied
    #[serde(default)]
    pub defaults: Option<CacheBehaviorDefaults>,
    /// Comment as last applied
    #[serde(default)]
    pub comment: String,
    /// When the last successful create or update happened
    pub last_applied: chrono::DateTime<chrono::Utc>,
}

impl DistributionState {
    /// Whether this state refers to a deployed distribution
    pub fn is_deployed(&self) -> bool {
        !self.id.is_empty()
    }

    /// Caller-facing output record
    pub fn output(&self, name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "id": self.id,
            "arn": self.arn,
            "url": self.url,
        })
    }
}

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// State stores may perform I/O for persistence and hold locks for thread
/// safety. They must not make provider calls or decide when to reconcile;
/// that belongs to `DistributionEngine`.
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **Thread-safe**: all methods may be called concurrently
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the state of a named distribution
    ///
    /// # Returns
    ///
    /// - `Ok(Some(state))`: the last applied state
    /// - `Ok(None)`: never deployed (or removed)
    /// - `Err(Error)`: storage error
    async fn get_state(&self, name: &str) -> Result<Option<DistributionState>, crate::Error>;

    /// Create or replace the state of a named distribution
    async fn set_state(&self, name: &str, state: &DistributionState) -> Result<(), crate::Error>;

    /// Delete the state of a named distribution
    ///
    /// Deleting a name that has no state is not an error.
    async fn delete_state(&self, name: &str) -> Result<(), crate::Error>;

    /// List all distribution names in the store
    async fn list_states(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
