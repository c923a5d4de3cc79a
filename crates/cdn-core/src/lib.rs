// # cdn-core
//
// Core library for declarative CDN distribution management.
//
// ## Architecture Overview
//
// - **origin**: Parses origin URLs/descriptors into normalized origins
// - **distribution**: Provider-shaped config and the origin/behavior builder
// - **identity**: Provisions the access identity for private buckets
// - **reconciler**: One create/update/no-op pass against a provider
// - **decommission**: Delete, or disable first when the provider insists
// - **DistributionEngine**: Persistence, pass restarts and events around the above
// - **ProviderRegistry**: Plugin-based registry for providers and state stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider SDKs
// 2. **Plugin-Based**: Providers are registered dynamically
// 3. **Idempotency**: Redeploying unchanged inputs makes no provider mutation
// 4. **Optimistic Concurrency**: Updates always carry the freshly fetched version token

pub mod config;
pub mod decommission;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod identity;
pub mod origin;
pub mod reconciler;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{CdnConfig, DistributionInputs, EngineConfig, ProviderConfig, StateStoreConfig};
pub use decommission::{Decommission, DistributionDecommissioner};
pub use distribution::{CacheBehaviorDefaults, DistributionConfig};
pub use engine::{DistributionEngine, EngineEvent, RemoveOutcome};
pub use error::{Error, Result};
pub use identity::AccessIdentityProvisioner;
pub use origin::{NormalizedOrigin, OriginDescriptor, OriginInput, parse_origins};
pub use reconciler::{DistributionReconciler, ReconcileAction, Reconciliation};
pub use registry::ProviderRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{DistributionProvider, DistributionState, StateStore};
