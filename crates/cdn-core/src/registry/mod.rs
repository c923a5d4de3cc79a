//! Plugin-based provider registry
//!
//! The registry allows CDN providers and state stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cdn_core::registry::ProviderRegistry;
//! use cdn_core::config::ProviderConfig;
//!
//! let registry = ProviderRegistry::new();
//! registry.register_builtin_state_stores();
//! cdn_provider_cloudfront::register(&registry);
//!
//! let provider = registry
//!     .create_provider(&ProviderConfig::cloudfront("us-east-1"))
//!     .await?;
//! ```
//!
//! ## Registration
//!
//! Provider crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("cloudfront", Arc::new(CloudFrontFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::{ProviderConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{DistributionProvider, DistributionProviderFactory, StateStore, StateStoreFactory};

/// Registry of provider and state store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Factories are cloned out of the lock before
/// their async `create` is awaited, so no lock is held across an await.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered CDN provider factories
    providers: RwLock<HashMap<String, Arc<dyn DistributionProviderFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a CDN provider factory
    ///
    /// Registering a name again replaces the previous factory.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Arc<dyn DistributionProviderFactory>,
    ) {
        let name = name.into();
        debug!("Registering provider factory {}", name);
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, factory);
    }

    /// Register a state store factory
    pub fn register_state_store(&self, name: impl Into<String>, factory: Arc<dyn StateStoreFactory>) {
        let name = name.into();
        debug!("Registering state store factory {}", name);
        self.state_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, factory);
    }

    /// Register the `memory` and `file` state stores
    pub fn register_builtin_state_stores(&self) {
        self.register_state_store("memory", Arc::new(MemoryStateStoreFactory));
        self.register_state_store("file", Arc::new(FileStateStoreFactory));
    }

    /// Create a CDN provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DistributionProvider>)`: Created provider instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub async fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DistributionProvider>> {
        let provider_type = config.type_name();
        let factory = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config).await
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StateStore>)`: Created state store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();
        let factory = self
            .state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
