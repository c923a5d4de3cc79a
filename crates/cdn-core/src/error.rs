//! Error types for the CDN distribution core
//!
//! Input-shape errors (`InvalidOrigin`, `EmptyOriginList`, `DuplicateOrigin`)
//! are always raised before any provider call is made. Provider-side errors
//! carry the provider's error code verbatim.

use thiserror::Error;

use crate::traits::{ProviderError, ProviderErrorKind};

/// Result type alias for distribution operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the CDN distribution system
#[derive(Error, Debug)]
pub enum Error {
    /// An origin URL could not be parsed or has no usable host
    #[error("Invalid origin '{origin}': {reason}")]
    InvalidOrigin {
        /// The offending origin URL as supplied
        origin: String,
        /// Why it was rejected
        reason: String,
    },

    /// A distribution needs at least one origin
    #[error("At least one origin is required")]
    EmptyOriginList,

    /// Two origins resolve to the same id or path pattern
    #[error("Duplicate origin: {0}")]
    DuplicateOrigin(String),

    /// The access identity could not be created
    #[error("Access identity provisioning failed ({code}): {message}")]
    Provisioning {
        /// Provider error code
        code: String,
        /// Provider error message
        message: String,
    },

    /// The remembered distribution id is unknown to the provider
    #[error("Distribution not found: {id}")]
    DistributionNotFound {
        /// Distribution id that was looked up
        id: String,
    },

    /// The version token was stale when the update was submitted
    #[error("Concurrent modification of distribution {id} ({code}): {message}")]
    ConcurrentModification {
        /// Distribution id
        id: String,
        /// Provider error code
        code: String,
        /// Provider error message
        message: String,
    },

    /// Any other provider rejection
    #[error("Provider error ({provider}) [{code}]: {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Provider error code
        code: String,
        /// Error message
        message: String,
    },

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid origin error
    pub fn invalid_origin(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOrigin {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate origin error
    pub fn duplicate_origin(msg: impl Into<String>) -> Self {
        Self::DuplicateOrigin(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map a provider error raised while operating on distribution `id`
    ///
    /// `NotFound` and `Conflict` get their own variants; everything else,
    /// including an unconsumed `NotDisabled`, is a plain provider error.
    pub fn from_provider(provider: &str, id: &str, err: ProviderError) -> Self {
        match err.kind {
            ProviderErrorKind::NotFound => Self::DistributionNotFound { id: id.to_string() },
            ProviderErrorKind::Conflict => Self::ConcurrentModification {
                id: id.to_string(),
                code: err.code,
                message: err.message,
            },
            ProviderErrorKind::NotDisabled | ProviderErrorKind::Rejected => {
                Self::provider(provider, err.code, err.message)
            }
        }
    }

    /// Whether the caller should restart the whole reconciliation pass
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    /// Whether this error was raised from input validation, before any provider call
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOrigin { .. } | Self::EmptyOriginList | Self::DuplicateOrigin(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
