//! Origin and cache-behavior construction
//!
//! Turns normalized origins into the origin list and cache-behavior set of a
//! distribution config. The first origin becomes the target of the default
//! behavior; every further origin gets a path-pattern behavior.

use std::collections::HashSet;

use super::{
    CacheBehavior, CacheBehaviorDefaults, CacheBehaviorSet, CustomHeader, OriginConfig,
    OriginKind, OriginProtocolPolicy, PathCacheBehavior,
};
use crate::error::{Error, Result};
use crate::origin::{NormalizedOrigin, OriginScheme};
use crate::traits::AccessIdentity;

const DEFAULT_HTTP_PORT: u16 = 80;
const DEFAULT_HTTPS_PORT: u16 = 443;

/// The origin and cache-behavior parts of a distribution config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltOrigins {
    pub origins: Vec<OriginConfig>,
    pub cache_behaviors: CacheBehaviorSet,
}

/// Path pattern routing requests to a non-default origin
pub fn path_pattern_for(origin: &NormalizedOrigin) -> String {
    origin
        .path_pattern
        .clone()
        .unwrap_or_else(|| format!("/{}/*", origin.id))
}

/// Check that `origins` can form a distribution
///
/// Rejects an empty list, repeated origin ids and repeated path patterns.
/// Runs before any provider call so that bad input never reaches the remote.
pub fn validate_origins(origins: &[NormalizedOrigin]) -> Result<()> {
    if origins.is_empty() {
        return Err(Error::EmptyOriginList);
    }

    let mut ids = HashSet::new();
    for origin in origins {
        if !ids.insert(origin.id.as_str()) {
            return Err(Error::duplicate_origin(format!("origin id '{}'", origin.id)));
        }
    }

    // "*" is the default behavior's implicit pattern
    let mut patterns: HashSet<String> = HashSet::from(["*".to_string()]);
    for origin in &origins[1..] {
        let pattern = path_pattern_for(origin);
        if !patterns.insert(pattern.clone()) {
            return Err(Error::duplicate_origin(format!("path pattern '{}'", pattern)));
        }
    }

    Ok(())
}

/// Build origin configs and cache behaviors
///
/// `identity` is required when any storage origin is private. `defaults`
/// only apply to the default behavior; path-pattern behaviors use the base
/// settings.
pub fn build_origins(
    origins: &[NormalizedOrigin],
    identity: Option<&AccessIdentity>,
    defaults: Option<&CacheBehaviorDefaults>,
) -> Result<BuiltOrigins> {
    validate_origins(origins)?;

    let configs = origins
        .iter()
        .map(|origin| origin_config(origin, identity))
        .collect::<Result<Vec<_>>>()?;

    // The default behavior targets whatever ended up first in the built list
    let default_target = configs[0].id.clone();
    let default = match defaults {
        Some(defaults) => CacheBehavior::base(default_target).with_defaults(defaults),
        None => CacheBehavior::base(default_target),
    };

    let behaviors = origins[1..]
        .iter()
        .zip(&configs[1..])
        .map(|(origin, config)| PathCacheBehavior {
            path_pattern: path_pattern_for(origin),
            behavior: CacheBehavior::base(config.id.clone()),
        })
        .collect();

    Ok(BuiltOrigins {
        origins: configs,
        cache_behaviors: CacheBehaviorSet { default, behaviors },
    })
}

fn origin_config(origin: &NormalizedOrigin, identity: Option<&AccessIdentity>) -> Result<OriginConfig> {
    let kind = if origin.is_storage_origin {
        let origin_access_identity = if origin.is_private {
            let identity = identity.ok_or_else(|| Error::Provisioning {
                code: "MissingAccessIdentity".to_string(),
                message: format!("private origin '{}' needs an access identity", origin.id),
            })?;
            identity.origin_access_identity()
        } else {
            String::new()
        };
        OriginKind::S3 {
            origin_access_identity,
        }
    } else {
        let (protocol_policy, http_port, https_port) = match origin.scheme {
            OriginScheme::Https => (
                OriginProtocolPolicy::HttpsOnly,
                DEFAULT_HTTP_PORT,
                origin.port.unwrap_or(DEFAULT_HTTPS_PORT),
            ),
            OriginScheme::Http => (
                OriginProtocolPolicy::HttpOnly,
                origin.port.unwrap_or(DEFAULT_HTTP_PORT),
                DEFAULT_HTTPS_PORT,
            ),
        };
        OriginKind::Custom {
            protocol_policy,
            http_port,
            https_port,
        }
    };

    Ok(OriginConfig {
        id: origin.id.clone(),
        domain_name: origin.domain_name.clone(),
        origin_path: origin.path.clone(),
        custom_headers: origin
            .custom_headers
            .iter()
            .map(|(name, value)| CustomHeader {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::ViewerProtocolPolicy;
    use crate::origin::{OriginDescriptor, OriginInput, parse_origins};

    fn parse(inputs: Vec<OriginInput>) -> Vec<NormalizedOrigin> {
        parse_origins(&inputs).unwrap()
    }

    fn identity() -> AccessIdentity {
        AccessIdentity {
            id: "E3OAIEXAMPLE".to_string(),
            canonical_user_id: "abc123".to_string(),
        }
    }

    #[test]
    fn test_public_bucket() {
        let origins = parse(vec!["https://mybucket.s3.amazonaws.com".into()]);
        let built = build_origins(&origins, None, None).unwrap();

        assert_eq!(built.origins.len(), 1);
        assert_eq!(built.origins[0].id, "mybucket");
        assert_eq!(built.origins[0].domain_name, "mybucket.s3.amazonaws.com");
        assert_eq!(
            built.origins[0].kind,
            OriginKind::S3 {
                origin_access_identity: String::new()
            }
        );
        assert_eq!(built.cache_behaviors.default.target_origin_id, "mybucket");
        assert!(built.cache_behaviors.behaviors.is_empty());
    }

    #[test]
    fn test_private_bucket_uses_identity() {
        let origins = parse(vec![
            OriginDescriptor::new("https://mybucket.s3.amazonaws.com")
                .with_private(true)
                .into(),
        ]);
        let built = build_origins(&origins, Some(&identity()), None).unwrap();
        assert_eq!(
            built.origins[0].kind,
            OriginKind::S3 {
                origin_access_identity: "origin-access-identity/cloudfront/E3OAIEXAMPLE".to_string()
            }
        );
    }

    #[test]
    fn test_private_bucket_without_identity_fails() {
        let origins = parse(vec![
            OriginDescriptor::new("https://mybucket.s3.amazonaws.com")
                .with_private(true)
                .into(),
        ]);
        let err = build_origins(&origins, None, None).unwrap_err();
        assert!(matches!(err, Error::Provisioning { .. }));
    }

    #[test]
    fn test_custom_origin_ports() {
        let origins = parse(vec![
            "https://api.example.com".into(),
            "http://legacy.example.com:8080".into(),
        ]);
        let built = build_origins(&origins, None, None).unwrap();

        assert_eq!(
            built.origins[0].kind,
            OriginKind::Custom {
                protocol_policy: OriginProtocolPolicy::HttpsOnly,
                http_port: 80,
                https_port: 443,
            }
        );
        assert_eq!(
            built.origins[1].kind,
            OriginKind::Custom {
                protocol_policy: OriginProtocolPolicy::HttpOnly,
                http_port: 8080,
                https_port: 443,
            }
        );
    }

    #[test]
    fn test_additional_origins_get_path_behaviors() {
        let origins = parse(vec![
            "https://mybucket.s3.amazonaws.com".into(),
            "https://api.example.com".into(),
            OriginDescriptor::new("https://assets.s3.amazonaws.com")
                .with_path_pattern("/static/*")
                .into(),
        ]);
        let built = build_origins(&origins, None, None).unwrap();

        assert_eq!(built.cache_behaviors.default.target_origin_id, "mybucket");
        assert_eq!(
            built.cache_behaviors.path_patterns(),
            vec!["/api.example.com/*", "/static/*"]
        );
        assert_eq!(built.cache_behaviors.behaviors[0].behavior.target_origin_id, "api.example.com");
        assert_eq!(built.cache_behaviors.behaviors[1].behavior.target_origin_id, "assets");
    }

    #[test]
    fn test_default_behavior_targets_first_built_origin() {
        let origins = parse(vec![
            "https://api.example.com".into(),
            "https://mybucket.s3.amazonaws.com".into(),
        ]);
        let built = build_origins(&origins, None, None).unwrap();

        assert_eq!(built.origins[0].id, "api.example.com");
        assert_eq!(
            built.cache_behaviors.default.target_origin_id,
            built.origins[0].id
        );
        assert!(
            built
                .cache_behaviors
                .behaviors
                .iter()
                .all(|b| b.behavior.target_origin_id != built.origins[0].id)
        );
    }

    #[test]
    fn test_defaults_apply_to_default_behavior_only() {
        let origins = parse(vec![
            "https://mybucket.s3.amazonaws.com".into(),
            "https://api.example.com".into(),
        ]);
        let defaults = CacheBehaviorDefaults {
            ttl: Some(60),
            viewer_protocol_policy: Some(ViewerProtocolPolicy::AllowAll),
            ..Default::default()
        };
        let built = build_origins(&origins, None, Some(&defaults)).unwrap();

        assert_eq!(built.cache_behaviors.default.default_ttl, 60);
        assert_eq!(
            built.cache_behaviors.default.viewer_protocol_policy,
            ViewerProtocolPolicy::AllowAll
        );
        assert_eq!(
            built.cache_behaviors.behaviors[0].behavior,
            CacheBehavior::base("api.example.com")
        );
    }

    #[test]
    fn test_empty_and_duplicates_rejected() {
        assert!(matches!(
            build_origins(&[], None, None),
            Err(Error::EmptyOriginList)
        ));

        let origins = parse(vec![
            "https://mybucket.s3.amazonaws.com".into(),
            "https://mybucket.s3.us-west-2.amazonaws.com".into(),
        ]);
        assert!(matches!(
            build_origins(&origins, None, None),
            Err(Error::DuplicateOrigin(_))
        ));

        let origins = parse(vec![
            "https://mybucket.s3.amazonaws.com".into(),
            OriginDescriptor::new("https://a.example.com")
                .with_path_pattern("/x/*")
                .into(),
            OriginDescriptor::new("https://b.example.com")
                .with_path_pattern("/x/*")
                .into(),
        ]);
        assert!(matches!(
            validate_origins(&origins),
            Err(Error::DuplicateOrigin(_))
        ));
    }

    #[test]
    fn test_origin_path_and_headers_carried() {
        let origins = parse(vec![
            OriginDescriptor::new("https://api.example.com/v1/")
                .with_header("X-Api-Key", "secret")
                .into(),
        ]);
        let built = build_origins(&origins, None, None).unwrap();
        assert_eq!(built.origins[0].origin_path, "/v1");
        assert_eq!(
            built.origins[0].custom_headers,
            vec![CustomHeader {
                name: "X-Api-Key".to_string(),
                value: "secret".to_string()
            }]
        );
    }
}
