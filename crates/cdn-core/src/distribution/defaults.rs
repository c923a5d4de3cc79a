//! Cache behavior defaults
//!
//! The base behavior every origin gets, and the caller-supplied overrides
//! that are layered on top of the default behavior.

use serde::{Deserialize, Serialize};

use super::{CacheBehavior, CookieForward, ForwardedValues, HttpMethod, ViewerProtocolPolicy};

/// Default TTL in seconds (one day)
pub const DEFAULT_TTL: i64 = 86_400;

/// Maximum TTL in seconds (one year)
pub const MAX_TTL: i64 = 31_536_000;

/// Caller overrides for forwarded values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<CookieForward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
}

/// Caller overrides for the default cache behavior
///
/// Unset fields keep the base value. Compared structurally when deciding
/// whether a redeploy is needed, so it is persisted exactly as supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheBehaviorDefaults {
    /// Default TTL; min TTL stays 0 and max TTL grows to cover it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_http_methods: Option<Vec<HttpMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_protocol_policy: Option<ViewerProtocolPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<ForwardDefaults>,
}

impl CacheBehavior {
    /// Base behavior for `target_origin_id`
    ///
    /// Redirects viewers to HTTPS, accepts and caches GET and HEAD only,
    /// forwards nothing and caches for a day.
    pub fn base(target_origin_id: impl Into<String>) -> Self {
        Self {
            target_origin_id: target_origin_id.into(),
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            allowed_methods: vec![HttpMethod::Head, HttpMethod::Get],
            cached_methods: vec![HttpMethod::Head, HttpMethod::Get],
            compress: false,
            smooth_streaming: false,
            forwarded_values: ForwardedValues::default(),
            min_ttl: 0,
            default_ttl: DEFAULT_TTL,
            max_ttl: MAX_TTL,
        }
    }

    /// Layer caller overrides on top of this behavior
    pub fn with_defaults(mut self, defaults: &CacheBehaviorDefaults) -> Self {
        if let Some(ttl) = defaults.ttl {
            let ttl = ttl.max(0);
            self.default_ttl = ttl;
            self.max_ttl = self.max_ttl.max(ttl);
        }
        if let Some(methods) = &defaults.allowed_http_methods {
            let mut allowed = methods.clone();
            allowed.sort();
            allowed.dedup();
            // Only GET, HEAD and OPTIONS responses are cacheable
            self.cached_methods = allowed
                .iter()
                .copied()
                .filter(|m| matches!(m, HttpMethod::Get | HttpMethod::Head | HttpMethod::Options))
                .collect();
            self.allowed_methods = allowed;
        }
        if let Some(compress) = defaults.compress {
            self.compress = compress;
        }
        if let Some(policy) = defaults.viewer_protocol_policy {
            self.viewer_protocol_policy = policy;
        }
        if let Some(forward) = &defaults.forward {
            if let Some(cookies) = &forward.cookies {
                self.forwarded_values.cookies = cookies.clone();
            }
            if let Some(query_string) = forward.query_string {
                self.forwarded_values.query_string = query_string;
            }
            if let Some(headers) = &forward.headers {
                self.forwarded_values.headers = headers.clone();
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_behavior() {
        let behavior = CacheBehavior::base("mybucket");
        assert_eq!(behavior.target_origin_id, "mybucket");
        assert_eq!(behavior.viewer_protocol_policy, ViewerProtocolPolicy::RedirectToHttps);
        assert_eq!(behavior.allowed_methods, vec![HttpMethod::Head, HttpMethod::Get]);
        assert_eq!(behavior.cached_methods, vec![HttpMethod::Head, HttpMethod::Get]);
        assert_eq!(behavior.forwarded_values.cookies, CookieForward::None);
        assert!(!behavior.forwarded_values.query_string);
        assert_eq!((behavior.min_ttl, behavior.default_ttl, behavior.max_ttl), (0, 86_400, 31_536_000));
    }

    #[test]
    fn test_empty_defaults_change_nothing() {
        let base = CacheBehavior::base("origin");
        assert_eq!(base.clone().with_defaults(&CacheBehaviorDefaults::default()), base);
    }

    #[test]
    fn test_overrides() {
        let defaults: CacheBehaviorDefaults = serde_json::from_value(serde_json::json!({
            "ttl": 10,
            "allowedHttpMethods": ["GET", "HEAD", "OPTIONS", "PUT", "POST", "PATCH", "DELETE"],
            "compress": true,
            "viewerProtocolPolicy": "https-only",
            "forward": { "cookies": "all", "queryString": true, "headers": ["Origin"] }
        }))
        .unwrap();

        let behavior = CacheBehavior::base("origin").with_defaults(&defaults);
        assert_eq!(behavior.default_ttl, 10);
        assert_eq!(behavior.max_ttl, MAX_TTL);
        assert_eq!(behavior.allowed_methods.len(), 7);
        assert_eq!(
            behavior.cached_methods,
            vec![HttpMethod::Get, HttpMethod::Head, HttpMethod::Options]
        );
        assert!(behavior.compress);
        assert_eq!(behavior.viewer_protocol_policy, ViewerProtocolPolicy::HttpsOnly);
        assert_eq!(behavior.forwarded_values.cookies, CookieForward::All);
        assert!(behavior.forwarded_values.query_string);
        assert_eq!(behavior.forwarded_values.headers, vec!["Origin".to_string()]);
    }

    #[test]
    fn test_ttl_above_max_raises_max() {
        let defaults = CacheBehaviorDefaults {
            ttl: Some(MAX_TTL * 2),
            ..Default::default()
        };
        let behavior = CacheBehavior::base("origin").with_defaults(&defaults);
        assert_eq!(behavior.default_ttl, MAX_TTL * 2);
        assert_eq!(behavior.max_ttl, MAX_TTL * 2);
    }
}
