// # Distribution Provider Trait
//
// Defines the interface to a CDN provider's distribution control plane.
//
// ## Implementations
//
// - CloudFront: `cdn-provider-cloudfront` crate
//
// ## Update protocol
//
// The provider guards every config change with a version token:
//
// ```rust,ignore
// let fetched = provider.get_distribution_config("E2ABC").await?;
// let mut request = fetched.into_update("E2ABC");
// request.config.enabled = false;
// provider.update_distribution(&request).await?;
// ```
//
// Submitting with a token that is not the one from the immediately preceding
// fetch is rejected with `ProviderErrorKind::Conflict`.

use async_trait::async_trait;

use crate::distribution::DistributionConfig;

/// Reference prefix the provider expects for an access identity on a storage origin
pub const ACCESS_IDENTITY_PATH_PREFIX: &str = "origin-access-identity/cloudfront/";

/// Category of a provider failure
///
/// The core only branches on these kinds; the provider's own error code is
/// carried alongside for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The distribution id is unknown
    NotFound,
    /// The version token was stale
    Conflict,
    /// The distribution must be disabled before it can be deleted
    NotDisabled,
    /// Any other rejection
    Rejected,
}

/// A failed provider call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Failure category
    pub kind: ProviderErrorKind,
    /// Provider error code, e.g. `PreconditionFailed`
    pub code: String,
    /// Provider error message
    pub message: String,
}

impl ProviderError {
    /// Create a provider error
    pub fn new(kind: ProviderErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a generic rejection
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Rejected, code, message)
    }
}

/// Identifiers of a distribution returned by create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSummary {
    /// Distribution id
    pub id: String,
    /// Distribution ARN
    pub arn: String,
    /// CDN domain name, e.g. `d111111abcdef8.cloudfront.net`
    pub domain_name: String,
}

impl DistributionSummary {
    /// Public URL of the distribution
    pub fn url(&self) -> String {
        format!("https://{}", self.domain_name)
    }
}

/// A credential principal the CDN uses to read private bucket content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
    /// Identity id
    pub id: String,
    /// Canonical user id to grant bucket read access to
    pub canonical_user_id: String,
}

impl AccessIdentity {
    /// Reference used in a storage origin's access identity field
    pub fn origin_access_identity(&self) -> String {
        format!("{}{}", ACCESS_IDENTITY_PATH_PREFIX, self.id)
    }
}

/// A fetched distribution config together with its version token
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedConfig {
    /// Optimistic-concurrency token of this fetch
    pub version_token: String,
    /// The current remote config
    pub config: DistributionConfig,
}

impl VersionedConfig {
    /// Turn a fetch result into an update submission for `id`
    ///
    /// The fetched token moves into `if_match`; the config is kept as the
    /// base onto which changes are overlaid.
    pub fn into_update(self, id: impl Into<String>) -> UpdateRequest {
        UpdateRequest {
            id: id.into(),
            if_match: self.version_token,
            config: self.config,
        }
    }
}

/// An update submission
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Target distribution id
    pub id: String,
    /// Version token from the immediately preceding fetch
    pub if_match: String,
    /// Full config to submit
    pub config: DistributionConfig,
}

/// A delete submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Target distribution id
    pub id: String,
    /// Version token from the immediately preceding fetch
    pub if_match: String,
}

impl DeleteRequest {
    /// Create a delete request
    pub fn new(id: impl Into<String>, if_match: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            if_match: if_match.into(),
        }
    }
}

/// Trait for CDN provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers translate single calls to the remote API and report failures.
/// They must not retry, cache configs between calls or decide whether a
/// change is needed; all of that belongs to the reconciler and the engine.
/// One call on this trait is one remote request.
#[async_trait]
pub trait DistributionProvider: Send + Sync {
    /// Create a distribution from a full config
    async fn create_distribution(
        &self,
        config: &DistributionConfig,
    ) -> Result<DistributionSummary, ProviderError>;

    /// Fetch the current config and its version token
    ///
    /// Fails with `ProviderErrorKind::NotFound` when the id is unknown.
    async fn get_distribution_config(&self, id: &str) -> Result<VersionedConfig, ProviderError>;

    /// Submit a full config guarded by a version token
    ///
    /// Fails with `ProviderErrorKind::Conflict` when the token is stale.
    async fn update_distribution(
        &self,
        request: &UpdateRequest,
    ) -> Result<DistributionSummary, ProviderError>;

    /// Delete a distribution guarded by a version token
    ///
    /// Fails with `ProviderErrorKind::NotDisabled` while the distribution is enabled.
    async fn delete_distribution(&self, request: &DeleteRequest) -> Result<(), ProviderError>;

    /// Create (or look up) the access identity
    ///
    /// Repeated calls return the same identity.
    async fn create_access_identity(&self) -> Result<AccessIdentity, ProviderError>;

    /// Provider name for logging, e.g. "cloudfront"
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing distribution providers from configuration
#[async_trait]
pub trait DistributionProviderFactory: Send + Sync {
    /// Create a provider instance from configuration
    async fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DistributionProvider>, crate::Error>;
}
