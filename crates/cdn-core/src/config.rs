//! Configuration types for the CDN distribution system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::distribution::CacheBehaviorDefaults;
use crate::origin::OriginInput;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Caller reference used when creating the shared access identity
pub const DEFAULT_ACCESS_IDENTITY_CALLER_REFERENCE: &str = "cdn-managed-origin-access-identity";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdnConfig {
    /// CDN provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl CdnConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// CDN provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Amazon CloudFront
    #[serde(rename = "cloudfront")]
    CloudFront {
        /// Region for the SDK client
        #[serde(default = "default_region")]
        region: String,
        /// Caller reference of the shared access identity
        #[serde(default = "default_access_identity_caller_reference")]
        access_identity_caller_reference: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// CloudFront config for `region`
    pub fn cloudfront(region: impl Into<String>) -> Self {
        ProviderConfig::CloudFront {
            region: region.into(),
            access_identity_caller_reference: default_access_identity_caller_reference(),
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::CloudFront {
                region,
                access_identity_caller_reference,
            } => {
                if region.is_empty() {
                    return Err(crate::Error::config("CloudFront region cannot be empty"));
                }
                if access_identity_caller_reference.is_empty() {
                    return Err(crate::Error::config(
                        "Access identity caller reference cannot be empty",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::CloudFront { .. } => "cloudfront",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::cloudfront(DEFAULT_REGION)
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            StateStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom state store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Desired state of one distribution
///
/// This is what a caller deploys. `enabled`, `comment` and `region` fall back
/// to their defaults when omitted from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionInputs {
    /// Origins in priority order; the first one serves the default behavior
    pub origins: Vec<OriginInput>,

    /// Whether the distribution serves traffic
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form comment shown in the provider console
    #[serde(default, deserialize_with = "comment_from_any")]
    pub comment: String,

    /// Overrides for the default cache behavior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<CacheBehaviorDefaults>,

    /// Region for the provider client
    #[serde(default = "default_region")]
    pub region: String,
}

impl DistributionInputs {
    /// Create inputs for the given origins with default settings
    pub fn new(origins: Vec<OriginInput>) -> Self {
        Self {
            origins,
            enabled: true,
            comment: String::new(),
            defaults: None,
            region: default_region(),
        }
    }

    /// Enable or disable the distribution
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Set default cache behavior overrides
    pub fn with_defaults(mut self, defaults: CacheBehaviorDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

/// Accept any JSON scalar as a comment; non-strings are stringified
fn comment_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn default_enabled() -> bool {
    true
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_access_identity_caller_reference() -> String {
    DEFAULT_ACCESS_IDENTITY_CALLER_REFERENCE.to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many times a pass is restarted after a concurrent modification
    #[serde(default = "default_max_pass_retries")]
    pub max_pass_retries: usize,

    /// Delay between restarted passes (in milliseconds)
    #[serde(default = "default_pass_retry_delay_ms")]
    pub pass_retry_delay_ms: u64,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "Event channel capacity must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pass_retries: default_max_pass_retries(),
            pass_retry_delay_ms: default_pass_retry_delay_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_max_pass_retries() -> usize {
    2
}

fn default_pass_retry_delay_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_defaults() {
        let inputs: DistributionInputs = serde_json::from_value(serde_json::json!({
            "origins": ["https://mybucket.s3.amazonaws.com"]
        }))
        .unwrap();

        assert!(inputs.enabled);
        assert_eq!(inputs.comment, "");
        assert_eq!(inputs.region, "us-east-1");
        assert!(inputs.defaults.is_none());
        assert_eq!(inputs.origins.len(), 1);
    }

    #[test]
    fn test_inputs_comment_is_stringified() {
        let inputs: DistributionInputs = serde_json::from_value(serde_json::json!({
            "origins": [{ "url": "https://mybucket.s3.amazonaws.com", "private": true }],
            "comment": 42,
            "enabled": false
        }))
        .unwrap();

        assert_eq!(inputs.comment, "42");
        assert!(!inputs.enabled);
        assert!(inputs.origins[0].is_private());
    }

    #[test]
    fn test_provider_config_tags() {
        let config: ProviderConfig =
            serde_json::from_value(serde_json::json!({ "type": "cloudfront" })).unwrap();
        assert_eq!(config.type_name(), "cloudfront");
        match config {
            ProviderConfig::CloudFront {
                region,
                access_identity_caller_reference,
            } => {
                assert_eq!(region, DEFAULT_REGION);
                assert_eq!(
                    access_identity_caller_reference,
                    DEFAULT_ACCESS_IDENTITY_CALLER_REFERENCE
                );
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_validation() {
        assert!(CdnConfig::new().validate().is_ok());

        let config = CdnConfig {
            provider: ProviderConfig::cloudfront(""),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CdnConfig {
            state_store: StateStoreConfig::File {
                path: String::new(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CdnConfig {
            engine: EngineConfig {
                event_channel_capacity: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_defaults() {
        let engine: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(engine.max_pass_retries, 2);
        assert_eq!(engine.pass_retry_delay_ms, 1000);
        assert_eq!(engine.event_channel_capacity, 100);
    }
}
