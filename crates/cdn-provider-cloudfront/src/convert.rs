//! Conversion between core distribution configs and CloudFront SDK types
//!
//! Reading goes SDK -> core and keeps the full SDK config alongside as the
//! config's `upstream` data. Writing goes core -> SDK: for a fetched config
//! the SDK document is rebuilt from the upstream copy so that everything the
//! core does not model survives, and origins or behaviors are only
//! regenerated when the core actually changed them.

use aws_sdk_cloudfront::types::{
    Aliases, AllowedMethods, CacheBehavior as SdkCacheBehavior, CacheBehaviors, CachedMethods,
    CookieNames, CookiePreference, CustomHeaders, CustomOriginConfig,
    DefaultCacheBehavior as SdkDefaultCacheBehavior, DistributionConfig as SdkDistributionConfig,
    ForwardedValues as SdkForwardedValues, Headers, HttpVersion, ItemSelection, Method, Origin,
    OriginCustomHeader, OriginProtocolPolicy as SdkOriginProtocolPolicy, Origins, PriceClass,
    S3OriginConfig, TrustedSigners, ViewerProtocolPolicy as SdkViewerProtocolPolicy,
};
use cdn_core::distribution::{
    CacheBehavior, CacheBehaviorSet, CookieForward, CustomHeader, DistributionConfig,
    ForwardedValues, HttpMethod, OriginConfig, OriginKind, OriginProtocolPolicy,
    PathCacheBehavior, Upstream, ViewerProtocolPolicy,
};
use cdn_core::traits::ProviderError;

/// Error code reported when a config cannot be converted
pub const INVALID_CONFIG_CODE: &str = "InvalidDistributionConfig";

/// SDK config of a fetch, plus the core view of its origins and behaviors
#[derive(Debug, Clone)]
pub struct FetchedConfig {
    pub sdk: SdkDistributionConfig,
    pub origins: Vec<OriginConfig>,
    pub cache_behaviors: CacheBehaviorSet,
}

fn invalid(message: impl Into<String>) -> ProviderError {
    ProviderError::rejected(INVALID_CONFIG_CODE, message)
}

fn build_error(err: aws_sdk_cloudfront::error::BuildError) -> ProviderError {
    invalid(err.to_string())
}

fn quantity(len: usize) -> Result<i32, ProviderError> {
    i32::try_from(len).map_err(|_| invalid(format!("too many items: {}", len)))
}

// ---------------------------------------------------------------------------
// SDK -> core
// ---------------------------------------------------------------------------

/// Convert a fetched SDK config into a core config carrying it as upstream
pub fn from_sdk(sdk: SdkDistributionConfig) -> Result<DistributionConfig, ProviderError> {
    let origins = sdk
        .origins()
        .map(|o| o.items().iter().map(origin_from_sdk).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let default = sdk
        .default_cache_behavior()
        .ok_or_else(|| invalid("distribution has no default cache behavior"))
        .and_then(default_behavior_from_sdk)?;

    let behaviors = sdk
        .cache_behaviors()
        .map(|b| b.items().iter().map(path_behavior_from_sdk).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let cache_behaviors = CacheBehaviorSet { default, behaviors };

    let config = DistributionConfig {
        caller_reference: sdk.caller_reference().to_string(),
        comment: sdk.comment().to_string(),
        enabled: sdk.enabled(),
        price_class: sdk
            .price_class()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| cdn_core::distribution::DEFAULT_PRICE_CLASS.to_string()),
        http_version: sdk
            .http_version()
            .map(|v| v.as_str().to_string())
            .unwrap_or_else(|| cdn_core::distribution::DEFAULT_HTTP_VERSION.to_string()),
        aliases: sdk.aliases().map(|a| a.items().to_vec()).unwrap_or_default(),
        origins: origins.clone(),
        cache_behaviors: cache_behaviors.clone(),
        upstream: None,
    };

    Ok(DistributionConfig {
        upstream: Some(Upstream::new(FetchedConfig {
            sdk,
            origins,
            cache_behaviors,
        })),
        ..config
    })
}

fn origin_from_sdk(origin: &Origin) -> Result<OriginConfig, ProviderError> {
    let kind = match (origin.s3_origin_config(), origin.custom_origin_config()) {
        (Some(s3), _) => OriginKind::S3 {
            origin_access_identity: s3.origin_access_identity().to_string(),
        },
        (None, Some(custom)) => OriginKind::Custom {
            protocol_policy: match custom.origin_protocol_policy() {
                SdkOriginProtocolPolicy::HttpOnly => OriginProtocolPolicy::HttpOnly,
                SdkOriginProtocolPolicy::HttpsOnly => OriginProtocolPolicy::HttpsOnly,
                _ => OriginProtocolPolicy::MatchViewer,
            },
            http_port: port(custom.http_port())?,
            https_port: port(custom.https_port())?,
        },
        // Origin access control setups have neither block; treat as a bucket
        (None, None) => OriginKind::S3 {
            origin_access_identity: String::new(),
        },
    };

    Ok(OriginConfig {
        id: origin.id().to_string(),
        domain_name: origin.domain_name().to_string(),
        origin_path: origin.origin_path().unwrap_or_default().to_string(),
        custom_headers: origin
            .custom_headers()
            .map(|h| {
                h.items()
                    .iter()
                    .map(|header| CustomHeader {
                        name: header.header_name().to_string(),
                        value: header.header_value().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        kind,
    })
}

fn port(value: i32) -> Result<u16, ProviderError> {
    u16::try_from(value).map_err(|_| invalid(format!("invalid port {}", value)))
}

fn viewer_policy_from_sdk(policy: &SdkViewerProtocolPolicy) -> ViewerProtocolPolicy {
    match policy {
        SdkViewerProtocolPolicy::AllowAll => ViewerProtocolPolicy::AllowAll,
        SdkViewerProtocolPolicy::HttpsOnly => ViewerProtocolPolicy::HttpsOnly,
        _ => ViewerProtocolPolicy::RedirectToHttps,
    }
}

fn methods_from_sdk(methods: &[Method]) -> Vec<HttpMethod> {
    methods
        .iter()
        .filter_map(|m| match m {
            Method::Get => Some(HttpMethod::Get),
            Method::Head => Some(HttpMethod::Head),
            Method::Options => Some(HttpMethod::Options),
            Method::Put => Some(HttpMethod::Put),
            Method::Post => Some(HttpMethod::Post),
            Method::Patch => Some(HttpMethod::Patch),
            Method::Delete => Some(HttpMethod::Delete),
            _ => None,
        })
        .collect()
}

fn forwarded_from_sdk(forwarded: Option<&SdkForwardedValues>) -> ForwardedValues {
    let Some(forwarded) = forwarded else {
        return ForwardedValues::default();
    };

    let cookies = match forwarded.cookies() {
        Some(cookies) => match cookies.forward() {
            ItemSelection::All => CookieForward::All,
            ItemSelection::Whitelist => CookieForward::Whitelist(
                cookies
                    .whitelisted_names()
                    .map(|n| n.items().to_vec())
                    .unwrap_or_default(),
            ),
            _ => CookieForward::None,
        },
        None => CookieForward::None,
    };

    ForwardedValues {
        query_string: forwarded.query_string(),
        cookies,
        headers: forwarded
            .headers()
            .map(|h| h.items().to_vec())
            .unwrap_or_default(),
    }
}

/// Fields shared by default and path behaviors
struct BehaviorParts<'a> {
    target_origin_id: &'a str,
    viewer_protocol_policy: &'a SdkViewerProtocolPolicy,
    allowed_methods: Option<&'a AllowedMethods>,
    compress: Option<bool>,
    smooth_streaming: Option<bool>,
    forwarded_values: Option<&'a SdkForwardedValues>,
    min_ttl: Option<i64>,
    default_ttl: Option<i64>,
    max_ttl: Option<i64>,
}

impl BehaviorParts<'_> {
    fn into_core(self) -> CacheBehavior {
        let base = CacheBehavior::base(self.target_origin_id);
        let (allowed_methods, cached_methods) = match self.allowed_methods {
            Some(allowed) => (
                methods_from_sdk(allowed.items()),
                allowed
                    .cached_methods()
                    .map(|c| methods_from_sdk(c.items()))
                    .unwrap_or_else(|| base.cached_methods.clone()),
            ),
            None => (base.allowed_methods.clone(), base.cached_methods.clone()),
        };

        CacheBehavior {
            viewer_protocol_policy: viewer_policy_from_sdk(self.viewer_protocol_policy),
            allowed_methods,
            cached_methods,
            compress: self.compress.unwrap_or(false),
            smooth_streaming: self.smooth_streaming.unwrap_or(false),
            forwarded_values: forwarded_from_sdk(self.forwarded_values),
            min_ttl: self.min_ttl.unwrap_or(base.min_ttl),
            default_ttl: self.default_ttl.unwrap_or(base.default_ttl),
            max_ttl: self.max_ttl.unwrap_or(base.max_ttl),
            ..base
        }
    }
}

fn default_behavior_from_sdk(b: &SdkDefaultCacheBehavior) -> Result<CacheBehavior, ProviderError> {
    Ok(BehaviorParts {
        target_origin_id: b.target_origin_id(),
        viewer_protocol_policy: b.viewer_protocol_policy(),
        allowed_methods: b.allowed_methods(),
        compress: b.compress(),
        smooth_streaming: b.smooth_streaming(),
        forwarded_values: b.forwarded_values(),
        min_ttl: b.min_ttl(),
        default_ttl: b.default_ttl(),
        max_ttl: b.max_ttl(),
    }
    .into_core())
}

fn path_behavior_from_sdk(b: &SdkCacheBehavior) -> Result<PathCacheBehavior, ProviderError> {
    Ok(PathCacheBehavior {
        path_pattern: b.path_pattern().to_string(),
        behavior: BehaviorParts {
            target_origin_id: b.target_origin_id(),
            viewer_protocol_policy: b.viewer_protocol_policy(),
            allowed_methods: b.allowed_methods(),
            compress: b.compress(),
            smooth_streaming: b.smooth_streaming(),
            forwarded_values: b.forwarded_values(),
            min_ttl: b.min_ttl(),
            default_ttl: b.default_ttl(),
            max_ttl: b.max_ttl(),
        }
        .into_core(),
    })
}

// ---------------------------------------------------------------------------
// core -> SDK
// ---------------------------------------------------------------------------

/// Convert a core config into the SDK document to submit
pub fn to_sdk(config: &DistributionConfig) -> Result<SdkDistributionConfig, ProviderError> {
    let fetched = config
        .upstream
        .as_ref()
        .and_then(|u| u.downcast_ref::<FetchedConfig>());

    let (origins, default_behavior, behaviors) = match fetched {
        Some(fetched) => {
            let origins = if config.origins == fetched.origins {
                fetched.sdk.origins().cloned()
            } else {
                Some(origins_to_sdk(&config.origins)?)
            };
            let (default_behavior, behaviors) = if config.cache_behaviors == fetched.cache_behaviors {
                (
                    fetched.sdk.default_cache_behavior().cloned(),
                    fetched.sdk.cache_behaviors().cloned(),
                )
            } else {
                (
                    Some(default_behavior_to_sdk(&config.cache_behaviors.default)?),
                    Some(path_behaviors_to_sdk(&config.cache_behaviors.behaviors)?),
                )
            };
            (origins, default_behavior, behaviors)
        }
        None => (
            Some(origins_to_sdk(&config.origins)?),
            Some(default_behavior_to_sdk(&config.cache_behaviors.default)?),
            Some(path_behaviors_to_sdk(&config.cache_behaviors.behaviors)?),
        ),
    };

    let mut builder = SdkDistributionConfig::builder();
    if let Some(upstream) = fetched.map(|f| &f.sdk) {
        builder = builder
            .set_default_root_object(upstream.default_root_object().map(str::to_string))
            .set_origin_groups(upstream.origin_groups().cloned())
            .set_custom_error_responses(upstream.custom_error_responses().cloned())
            .set_logging(upstream.logging().cloned())
            .set_viewer_certificate(upstream.viewer_certificate().cloned())
            .set_restrictions(upstream.restrictions().cloned())
            .set_web_acl_id(upstream.web_acl_id().map(str::to_string))
            .set_is_ipv6_enabled(upstream.is_ipv6_enabled())
            .set_continuous_deployment_policy_id(
                upstream.continuous_deployment_policy_id().map(str::to_string),
            )
            .set_staging(upstream.staging());
    }

    builder
        .caller_reference(&config.caller_reference)
        .comment(&config.comment)
        .enabled(config.enabled)
        .price_class(PriceClass::from(config.price_class.as_str()))
        .http_version(HttpVersion::from(config.http_version.as_str()))
        .aliases(aliases_to_sdk(&config.aliases)?)
        .set_origins(origins)
        .set_default_cache_behavior(default_behavior)
        .set_cache_behaviors(behaviors)
        .build()
        .map_err(build_error)
}

fn aliases_to_sdk(aliases: &[String]) -> Result<Aliases, ProviderError> {
    Aliases::builder()
        .quantity(quantity(aliases.len())?)
        .set_items(Some(aliases.to_vec()))
        .build()
        .map_err(build_error)
}

fn origins_to_sdk(origins: &[OriginConfig]) -> Result<Origins, ProviderError> {
    let items = origins
        .iter()
        .map(origin_to_sdk)
        .collect::<Result<Vec<_>, _>>()?;

    Origins::builder()
        .quantity(quantity(items.len())?)
        .set_items(Some(items))
        .build()
        .map_err(build_error)
}

fn origin_to_sdk(origin: &OriginConfig) -> Result<Origin, ProviderError> {
    let headers = origin
        .custom_headers
        .iter()
        .map(|h| {
            OriginCustomHeader::builder()
                .header_name(&h.name)
                .header_value(&h.value)
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let custom_headers = CustomHeaders::builder()
        .quantity(quantity(headers.len())?)
        .set_items(Some(headers))
        .build()
        .map_err(build_error)?;

    let builder = Origin::builder()
        .id(&origin.id)
        .domain_name(&origin.domain_name)
        .origin_path(&origin.origin_path)
        .custom_headers(custom_headers);

    let builder = match &origin.kind {
        OriginKind::S3 {
            origin_access_identity,
        } => builder.s3_origin_config(
            S3OriginConfig::builder()
                .origin_access_identity(origin_access_identity)
                .build(),
        ),
        OriginKind::Custom {
            protocol_policy,
            http_port,
            https_port,
        } => builder.custom_origin_config(
            CustomOriginConfig::builder()
                .http_port(i32::from(*http_port))
                .https_port(i32::from(*https_port))
                .origin_protocol_policy(SdkOriginProtocolPolicy::from(protocol_policy.as_str()))
                .build()
                .map_err(build_error)?,
        ),
    };

    builder.build().map_err(build_error)
}

fn methods_to_sdk(methods: &[HttpMethod]) -> Vec<Method> {
    methods.iter().map(|m| Method::from(m.as_str())).collect()
}

fn allowed_methods_to_sdk(behavior: &CacheBehavior) -> Result<AllowedMethods, ProviderError> {
    let cached = CachedMethods::builder()
        .quantity(quantity(behavior.cached_methods.len())?)
        .set_items(Some(methods_to_sdk(&behavior.cached_methods)))
        .build()
        .map_err(build_error)?;

    AllowedMethods::builder()
        .quantity(quantity(behavior.allowed_methods.len())?)
        .set_items(Some(methods_to_sdk(&behavior.allowed_methods)))
        .cached_methods(cached)
        .build()
        .map_err(build_error)
}

fn forwarded_to_sdk(forwarded: &ForwardedValues) -> Result<SdkForwardedValues, ProviderError> {
    let cookies = match &forwarded.cookies {
        CookieForward::None => CookiePreference::builder().forward(ItemSelection::None),
        CookieForward::All => CookiePreference::builder().forward(ItemSelection::All),
        CookieForward::Whitelist(names) => CookiePreference::builder()
            .forward(ItemSelection::Whitelist)
            .whitelisted_names(
                CookieNames::builder()
                    .quantity(quantity(names.len())?)
                    .set_items(Some(names.clone()))
                    .build()
                    .map_err(build_error)?,
            ),
    }
    .build()
    .map_err(build_error)?;

    let headers = Headers::builder()
        .quantity(quantity(forwarded.headers.len())?)
        .set_items(Some(forwarded.headers.clone()))
        .build()
        .map_err(build_error)?;

    SdkForwardedValues::builder()
        .query_string(forwarded.query_string)
        .cookies(cookies)
        .headers(headers)
        .build()
        .map_err(build_error)
}

fn trusted_signers_disabled() -> Result<TrustedSigners, ProviderError> {
    TrustedSigners::builder()
        .enabled(false)
        .quantity(0)
        .build()
        .map_err(build_error)
}

fn default_behavior_to_sdk(behavior: &CacheBehavior) -> Result<SdkDefaultCacheBehavior, ProviderError> {
    SdkDefaultCacheBehavior::builder()
        .target_origin_id(&behavior.target_origin_id)
        .trusted_signers(trusted_signers_disabled()?)
        .viewer_protocol_policy(SdkViewerProtocolPolicy::from(
            behavior.viewer_protocol_policy.as_str(),
        ))
        .allowed_methods(allowed_methods_to_sdk(behavior)?)
        .smooth_streaming(behavior.smooth_streaming)
        .compress(behavior.compress)
        .forwarded_values(forwarded_to_sdk(&behavior.forwarded_values)?)
        .min_ttl(behavior.min_ttl)
        .default_ttl(behavior.default_ttl)
        .max_ttl(behavior.max_ttl)
        .build()
        .map_err(build_error)
}

fn path_behaviors_to_sdk(behaviors: &[PathCacheBehavior]) -> Result<CacheBehaviors, ProviderError> {
    let items = behaviors
        .iter()
        .map(|p| {
            let b = &p.behavior;
            SdkCacheBehavior::builder()
                .path_pattern(&p.path_pattern)
                .target_origin_id(&b.target_origin_id)
                .trusted_signers(trusted_signers_disabled()?)
                .viewer_protocol_policy(SdkViewerProtocolPolicy::from(
                    b.viewer_protocol_policy.as_str(),
                ))
                .allowed_methods(allowed_methods_to_sdk(b)?)
                .smooth_streaming(b.smooth_streaming)
                .compress(b.compress)
                .forwarded_values(forwarded_to_sdk(&b.forwarded_values)?)
                .min_ttl(b.min_ttl)
                .default_ttl(b.default_ttl)
                .max_ttl(b.max_ttl)
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    CacheBehaviors::builder()
        .quantity(quantity(items.len())?)
        .set_items(Some(items))
        .build()
        .map_err(build_error)
}
