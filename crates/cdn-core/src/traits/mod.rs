//! Core traits for the CDN distribution system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DistributionProvider`]: Talk to a CDN provider's control plane
//! - [`StateStore`]: Persist last-applied state between passes

pub mod distribution_provider;
pub mod state_store;

pub use distribution_provider::{
    ACCESS_IDENTITY_PATH_PREFIX, AccessIdentity, DeleteRequest, DistributionProvider,
    DistributionProviderFactory, DistributionSummary, ProviderError, ProviderErrorKind,
    UpdateRequest, VersionedConfig,
};
pub use state_store::{DistributionState, StateStore, StateStoreFactory};
