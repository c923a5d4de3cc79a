//! Origin descriptor parsing
//!
//! Turns user-supplied origin inputs (a bare URL, or a structured descriptor
//! with flags) into [`NormalizedOrigin`] records. Parsing is pure and order
//! preserving: one output per input, and the first output is the default
//! origin of the distribution.
//!
//! A host matching the object-storage bucket convention
//! (`<bucket>.s3[.<region>].amazonaws.com`) becomes a storage origin whose id
//! is the bucket name. Anything else is a custom HTTP origin identified by its
//! full host. Website endpoints (`s3-website-*`) are plain HTTP servers and are
//! treated as custom origins.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

static BUCKET_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<bucket>[a-z0-9][a-z0-9.\-]*)\.s3(?:\.dualstack)?(?:[.\-][a-z]{2}(?:-[a-z]+)+-\d+)?\.amazonaws\.com$",
    )
    .expect("bucket host pattern is valid")
});

/// An origin as supplied by the caller
///
/// Persisted verbatim in [`DistributionState`](crate::traits::DistributionState)
/// so that the next pass can diff against exactly what was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OriginInput {
    /// A bare origin URL, equivalent to `{ url, private: false }`
    Url(String),
    /// A structured descriptor with explicit flags and overrides
    Descriptor(OriginDescriptor),
}

impl OriginInput {
    /// The origin URL
    pub fn url(&self) -> &str {
        match self {
            OriginInput::Url(url) => url,
            OriginInput::Descriptor(descriptor) => &descriptor.url,
        }
    }

    /// Whether content behind this origin must be read through the access identity
    pub fn is_private(&self) -> bool {
        match self {
            OriginInput::Url(_) => false,
            OriginInput::Descriptor(descriptor) => descriptor.private,
        }
    }
}

impl From<&str> for OriginInput {
    fn from(url: &str) -> Self {
        OriginInput::Url(url.to_string())
    }
}

impl From<OriginDescriptor> for OriginInput {
    fn from(descriptor: OriginDescriptor) -> Self {
        OriginInput::Descriptor(descriptor)
    }
}

/// Structured origin descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginDescriptor {
    /// Origin URL (required)
    pub url: String,

    /// Serve private bucket content through the access identity
    #[serde(default)]
    pub private: bool,

    /// Origin path prefix, e.g. `/static`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Custom headers the CDN sends to this origin
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Cache-behavior path pattern for a non-default origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<String>,
}

impl OriginDescriptor {
    /// Create a descriptor for `url` with every flag at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Mark the origin as private
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Set the origin path prefix
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a custom origin header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set an explicit cache-behavior path pattern
    pub fn with_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }
}

/// URL scheme of an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginScheme {
    Http,
    Https,
}

impl OriginScheme {
    fn as_str(self) -> &'static str {
        match self {
            OriginScheme::Http => "http",
            OriginScheme::Https => "https",
        }
    }
}

/// An origin after parsing and normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOrigin {
    /// Bucket name for storage origins, full host otherwise
    pub id: String,
    /// The URL host
    pub domain_name: String,
    /// Whether the host is an object-storage bucket endpoint
    pub is_storage_origin: bool,
    /// Whether reads go through the access identity
    pub is_private: bool,
    /// Origin path prefix (empty when unset)
    pub path: String,
    /// Custom headers in name order
    pub custom_headers: Vec<(String, String)>,
    /// Scheme the origin was declared with
    pub scheme: OriginScheme,
    /// Explicit port from the URL, if any
    pub port: Option<u16>,
    /// Explicit cache-behavior path pattern, if any
    pub path_pattern: Option<String>,
}

impl NormalizedOrigin {
    /// Reconstruct the origin URL (without path)
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme.as_str(), self.domain_name, port),
            None => format!("{}://{}", self.scheme.as_str(), self.domain_name),
        }
    }
}

/// Parse a sequence of origin inputs, preserving order
pub fn parse_origins(inputs: &[OriginInput]) -> Result<Vec<NormalizedOrigin>> {
    inputs.iter().map(parse_origin).collect()
}

/// Parse a single origin input
pub fn parse_origin(input: &OriginInput) -> Result<NormalizedOrigin> {
    let raw = input.url().trim();
    let url = parse_url(raw)?;

    let scheme = match url.scheme() {
        "https" => OriginScheme::Https,
        "http" => OriginScheme::Http,
        other => {
            return Err(Error::invalid_origin(
                raw,
                format!("unsupported scheme '{}'", other),
            ));
        }
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| Error::invalid_origin(raw, "URL has no host"))?
        .to_string();

    let (id, is_storage_origin) = match BUCKET_HOST.captures(&host) {
        Some(captures) => (captures["bucket"].to_string(), true),
        None => (host.clone(), false),
    };

    let (path, custom_headers, path_pattern) = match input {
        OriginInput::Url(_) => (url_path(&url), Vec::new(), None),
        OriginInput::Descriptor(descriptor) => (
            descriptor
                .path
                .as_deref()
                .map(normalize_origin_path)
                .unwrap_or_else(|| url_path(&url)),
            descriptor
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            descriptor.path_pattern.clone(),
        ),
    };

    Ok(NormalizedOrigin {
        id,
        domain_name: host,
        is_storage_origin,
        is_private: input.is_private(),
        path,
        custom_headers,
        scheme,
        port: url.port(),
        path_pattern,
    })
}

fn parse_url(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        // `api.example.com:8080` parses with the host as its scheme
        Ok(url) if url.scheme().contains('.') => parse_bare_host(raw),
        Ok(url) => Ok(url),
        // Accept a bare host such as `mybucket.s3.amazonaws.com`
        Err(url::ParseError::RelativeUrlWithoutBase) => parse_bare_host(raw),
        Err(e) => Err(Error::invalid_origin(raw, e.to_string())),
    }
}

fn parse_bare_host(raw: &str) -> Result<Url> {
    Url::parse(&format!("https://{}", raw)).map_err(|e| Error::invalid_origin(raw, e.to_string()))
}

fn url_path(url: &Url) -> String {
    normalize_origin_path(url.path())
}

/// Origin paths start with `/` and never end with one; the root path is empty
fn normalize_origin_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
