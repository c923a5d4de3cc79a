// # CloudFront Distribution Provider
//
// This crate provides the Amazon CloudFront implementation of
// `DistributionProvider` for the CDN distribution core.
//
// ## What it does
//
// - One SDK request per trait call
// - Maps CloudFront error codes onto `ProviderErrorKind`
// - Converts between core configs and SDK documents (see `convert`)
// - Carries the full fetched SDK config through an update, so settings the
//   core does not manage (certificates, logging, WAF, error pages) survive
//
// ## What it does not do
//
// - NO retries (owned by DistributionEngine)
// - NO change detection (owned by DistributionReconciler)
// - NO state access (owned by the engine's StateStore)
// - NO caching of configs or version tokens between calls
//
// ## Credentials
//
// Credentials come from the standard AWS provider chain (environment,
// profile, instance metadata). They are never logged.
//
// ## API Reference
//
// - CreateDistribution: POST `/2020-05-31/distribution`
// - GetDistributionConfig: GET `/2020-05-31/distribution/:id/config`
// - UpdateDistribution: PUT `/2020-05-31/distribution/:id/config` (If-Match)
// - DeleteDistribution: DELETE `/2020-05-31/distribution/:id` (If-Match)
// - CreateCloudFrontOriginAccessIdentity: POST `/2020-05-31/origin-access-identity/cloudfront`

pub mod convert;

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudfront::Client;
use aws_sdk_cloudfront::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudfront::types::{CloudFrontOriginAccessIdentityConfig, Distribution};
use cdn_core::config::ProviderConfig;
use cdn_core::distribution::DistributionConfig;
use cdn_core::registry::ProviderRegistry;
use cdn_core::traits::{
    AccessIdentity, DeleteRequest, DistributionProvider, DistributionProviderFactory,
    DistributionSummary, ProviderError, ProviderErrorKind, UpdateRequest, VersionedConfig,
};
use cdn_core::{Error, Result};
use tracing::{debug, info};

pub use convert::FetchedConfig;

/// Provider name used in logs and error reports
pub const PROVIDER_NAME: &str = "cloudfront";

/// Comment attached to the shared access identity
///
/// CloudFront only treats a repeated create as the same identity when both
/// the caller reference and the config match, so this must never change.
const ACCESS_IDENTITY_COMMENT: &str = "Managed access identity for CDN distributions";

/// Error code used when a response is missing a field the API always returns
const MALFORMED_RESPONSE_CODE: &str = "MalformedResponse";

/// Amazon CloudFront distribution provider
///
/// # Trust Level: Untrusted
///
/// Stateless apart from the SDK client. Every method is a single request.
pub struct CloudFrontProvider {
    /// SDK client (holds resolved credentials)
    client: Client,

    /// Region the client was configured with
    region: String,

    /// Caller reference for the shared access identity
    access_identity_caller_reference: String,
}

// The SDK client's Debug output includes its whole resolved config
impl std::fmt::Debug for CloudFrontProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFrontProvider")
            .field("client", &"<REDACTED>")
            .field("region", &self.region)
            .field(
                "access_identity_caller_reference",
                &self.access_identity_caller_reference,
            )
            .finish()
    }
}

impl CloudFrontProvider {
    /// Create a provider using credentials from the default AWS chain
    pub async fn new(
        region: impl Into<String>,
        access_identity_caller_reference: impl Into<String>,
    ) -> Self {
        let region = region.into();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;

        Self::from_client(
            Client::new(&sdk_config),
            region,
            access_identity_caller_reference,
        )
    }

    /// Create a provider around an existing SDK client
    pub fn from_client(
        client: Client,
        region: impl Into<String>,
        access_identity_caller_reference: impl Into<String>,
    ) -> Self {
        Self {
            client,
            region: region.into(),
            access_identity_caller_reference: access_identity_caller_reference.into(),
        }
    }
}

/// Map a CloudFront error code onto the core's error kinds
pub fn classify_code(code: &str) -> ProviderErrorKind {
    match code {
        "NoSuchDistribution" => ProviderErrorKind::NotFound,
        "PreconditionFailed" | "InvalidIfMatchVersion" => ProviderErrorKind::Conflict,
        "DistributionNotDisabled" => ProviderErrorKind::NotDisabled,
        _ => ProviderErrorKind::Rejected,
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    ProviderError::new(classify_code(&code), code, message)
}

fn malformed(what: &str) -> ProviderError {
    ProviderError::rejected(
        MALFORMED_RESPONSE_CODE,
        format!("response is missing {}", what),
    )
}

fn summary(
    distribution: Option<&Distribution>,
) -> std::result::Result<DistributionSummary, ProviderError> {
    let distribution = distribution.ok_or_else(|| malformed("the distribution"))?;
    Ok(DistributionSummary {
        id: distribution.id().to_string(),
        arn: distribution.arn().to_string(),
        domain_name: distribution.domain_name().to_string(),
    })
}

#[async_trait]
impl DistributionProvider for CloudFrontProvider {
    async fn create_distribution(
        &self,
        config: &DistributionConfig,
    ) -> std::result::Result<DistributionSummary, ProviderError> {
        let sdk_config = convert::to_sdk(config)?;

        let output = self
            .client
            .create_distribution()
            .distribution_config(sdk_config)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let created = summary(output.distribution())?;
        info!("Created CloudFront distribution {} ({})", created.id, created.domain_name);
        Ok(created)
    }

    async fn get_distribution_config(
        &self,
        id: &str,
    ) -> std::result::Result<VersionedConfig, ProviderError> {
        let output = self
            .client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let version_token = output
            .e_tag()
            .ok_or_else(|| malformed("the ETag header"))?
            .to_string();
        let sdk_config = output
            .distribution_config()
            .cloned()
            .ok_or_else(|| malformed("the distribution config"))?;

        debug!("Fetched config of distribution {} (ETag {})", id, version_token);
        Ok(VersionedConfig {
            version_token,
            config: convert::from_sdk(sdk_config)?,
        })
    }

    async fn update_distribution(
        &self,
        request: &UpdateRequest,
    ) -> std::result::Result<DistributionSummary, ProviderError> {
        let sdk_config = convert::to_sdk(&request.config)?;

        let output = self
            .client
            .update_distribution()
            .id(&request.id)
            .if_match(&request.if_match)
            .distribution_config(sdk_config)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let updated = summary(output.distribution())?;
        info!("Updated CloudFront distribution {}", updated.id);
        Ok(updated)
    }

    async fn delete_distribution(
        &self,
        request: &DeleteRequest,
    ) -> std::result::Result<(), ProviderError> {
        self.client
            .delete_distribution()
            .id(&request.id)
            .if_match(&request.if_match)
            .send()
            .await
            .map_err(map_sdk_error)?;

        info!("Deleted CloudFront distribution {}", request.id);
        Ok(())
    }

    async fn create_access_identity(&self) -> std::result::Result<AccessIdentity, ProviderError> {
        let identity_config = CloudFrontOriginAccessIdentityConfig::builder()
            .caller_reference(&self.access_identity_caller_reference)
            .comment(ACCESS_IDENTITY_COMMENT)
            .build()
            .map_err(|e| ProviderError::rejected(convert::INVALID_CONFIG_CODE, e.to_string()))?;

        let output = self
            .client
            .create_cloud_front_origin_access_identity()
            .cloud_front_origin_access_identity_config(identity_config)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let identity = output
            .cloud_front_origin_access_identity()
            .ok_or_else(|| malformed("the origin access identity"))?;

        debug!("Using origin access identity {}", identity.id());
        Ok(AccessIdentity {
            id: identity.id().to_string(),
            canonical_user_id: identity.s3_canonical_user_id().to_string(),
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating CloudFront providers from configuration
pub struct CloudFrontFactory;

#[async_trait]
impl DistributionProviderFactory for CloudFrontFactory {
    async fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DistributionProvider>> {
        match config {
            ProviderConfig::CloudFront {
                region,
                access_identity_caller_reference,
            } => {
                if region.trim().is_empty() {
                    return Err(Error::config("CloudFront region cannot be empty"));
                }
                let provider =
                    CloudFrontProvider::new(region.as_str(), access_identity_caller_reference.as_str())
                        .await;
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for CloudFront provider")),
        }
    }
}

/// Register the CloudFront provider with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Arc::new(CloudFrontFactory));
}
