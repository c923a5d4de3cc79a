//! Provider-shaped distribution configuration
//!
//! These types mirror the shape of a CDN distribution config closely enough
//! that an adapter can convert them field by field, while staying free of any
//! SDK dependency. [`builder`] produces the origin and cache-behavior parts
//! from normalized origins; [`DistributionConfig`] wraps them with the
//! distribution-level settings.

pub mod builder;
pub mod defaults;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use builder::{BuiltOrigins, build_origins};
pub use defaults::{CacheBehaviorDefaults, ForwardDefaults};

/// Price class applied to new distributions
pub const DEFAULT_PRICE_CLASS: &str = "PriceClass_All";

/// HTTP version applied to new distributions
pub const DEFAULT_HTTP_VERSION: &str = "http2";

/// Viewer protocol policy of a cache behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    HttpsOnly,
    RedirectToHttps,
}

impl ViewerProtocolPolicy {
    /// Wire name, e.g. `redirect-to-https`
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerProtocolPolicy::AllowAll => "allow-all",
            ViewerProtocolPolicy::HttpsOnly => "https-only",
            ViewerProtocolPolicy::RedirectToHttps => "redirect-to-https",
        }
    }
}

/// HTTP method a cache behavior accepts or caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Options,
    Put,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Wire name, e.g. `GET`
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Protocol the CDN uses to reach a custom origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginProtocolPolicy {
    HttpOnly,
    HttpsOnly,
    MatchViewer,
}

impl OriginProtocolPolicy {
    /// Wire name, e.g. `https-only`
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginProtocolPolicy::HttpOnly => "http-only",
            OriginProtocolPolicy::HttpsOnly => "https-only",
            OriginProtocolPolicy::MatchViewer => "match-viewer",
        }
    }
}

/// Cookie forwarding mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieForward {
    None,
    All,
    Whitelist(Vec<String>),
}

/// What the CDN forwards to the origin and keys the cache on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedValues {
    pub query_string: bool,
    pub cookies: CookieForward,
    pub headers: Vec<String>,
}

impl Default for ForwardedValues {
    fn default() -> Self {
        Self {
            query_string: false,
            cookies: CookieForward::None,
            headers: Vec::new(),
        }
    }
}

/// A header the CDN adds to every request sent to an origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

/// Origin-type specific settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginKind {
    /// Object-storage bucket origin
    S3 {
        /// `origin-access-identity/cloudfront/<id>` for private buckets, empty otherwise
        origin_access_identity: String,
    },
    /// Plain HTTP(S) origin
    Custom {
        protocol_policy: OriginProtocolPolicy,
        http_port: u16,
        https_port: u16,
    },
}

/// One origin entry of a distribution config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginConfig {
    pub id: String,
    pub domain_name: String,
    /// Path prefix, empty or starting with `/`
    pub origin_path: String,
    pub custom_headers: Vec<CustomHeader>,
    pub kind: OriginKind,
}

/// Routing and caching settings bound to one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: Vec<HttpMethod>,
    pub cached_methods: Vec<HttpMethod>,
    pub compress: bool,
    pub smooth_streaming: bool,
    pub forwarded_values: ForwardedValues,
    pub min_ttl: i64,
    pub default_ttl: i64,
    pub max_ttl: i64,
}

/// A cache behavior selected by a request path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCacheBehavior {
    pub path_pattern: String,
    pub behavior: CacheBehavior,
}

/// The default behavior plus any path-pattern behaviors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheBehaviorSet {
    pub default: CacheBehavior,
    pub behaviors: Vec<PathCacheBehavior>,
}

impl CacheBehaviorSet {
    /// Path patterns of the non-default behaviors, in order
    pub fn path_patterns(&self) -> Vec<&str> {
        self.behaviors.iter().map(|b| b.path_pattern.as_str()).collect()
    }
}

/// Opaque provider data attached to a fetched config
///
/// Adapters stash whatever they need to carry remote settings the core does
/// not model (aliases, certificates, logging, ...) from a fetch through to
/// the following update. The core clones it along and never looks inside.
#[derive(Clone)]
pub struct Upstream(Arc<dyn Any + Send + Sync>);

impl Upstream {
    /// Wrap adapter data
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the adapter data as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Upstream(..)")
    }
}

impl PartialEq for Upstream {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A full distribution config as submitted to or fetched from a provider
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionConfig {
    /// Idempotency token of the original create
    pub caller_reference: String,
    pub comment: String,
    pub enabled: bool,
    pub price_class: String,
    pub http_version: String,
    pub aliases: Vec<String>,
    pub origins: Vec<OriginConfig>,
    pub cache_behaviors: CacheBehaviorSet,
    /// Adapter data of the fetch this config came from
    pub upstream: Option<Upstream>,
}

impl DistributionConfig {
    /// Config for a brand new distribution
    pub fn new(
        caller_reference: impl Into<String>,
        comment: impl Into<String>,
        enabled: bool,
        built: BuiltOrigins,
    ) -> Self {
        Self {
            caller_reference: caller_reference.into(),
            comment: comment.into(),
            enabled,
            price_class: DEFAULT_PRICE_CLASS.to_string(),
            http_version: DEFAULT_HTTP_VERSION.to_string(),
            aliases: Vec::new(),
            origins: built.origins,
            cache_behaviors: built.cache_behaviors,
            upstream: None,
        }
    }

    /// Overlay the managed fields onto a fetched config
    ///
    /// Everything not managed here (caller reference, aliases, price class,
    /// upstream data) is left as fetched.
    pub fn apply(&mut self, enabled: bool, comment: &str, built: BuiltOrigins) {
        self.enabled = enabled;
        self.comment = comment.to_string();
        self.origins = built.origins;
        self.cache_behaviors = built.cache_behaviors;
    }
}
