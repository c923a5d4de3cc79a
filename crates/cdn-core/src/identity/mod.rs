//! Access identity provisioning
//!
//! Private storage origins are read through an access identity. The
//! provider's create call is idempotent on its side, so this module issues
//! it whenever a pass needs an identity and never caches the result.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::origin::NormalizedOrigin;
use crate::traits::{AccessIdentity, DistributionProvider};

/// Whether any origin needs the access identity
pub fn requires_access_identity(origins: &[NormalizedOrigin]) -> bool {
    origins.iter().any(|origin| origin.is_private)
}

/// Obtains the access identity for a pass
pub struct AccessIdentityProvisioner<'a> {
    provider: &'a dyn DistributionProvider,
}

impl<'a> AccessIdentityProvisioner<'a> {
    pub fn new(provider: &'a dyn DistributionProvider) -> Self {
        Self { provider }
    }

    /// Create (or look up) the identity
    ///
    /// `existing` is a previously seen identity id. It is advisory only: it
    /// is logged, and the provider call is made regardless. Rejections are
    /// not retried.
    pub async fn ensure(&self, existing: Option<&str>) -> Result<AccessIdentity> {
        if let Some(existing) = existing {
            debug!("Previously seen access identity: {}", existing);
        }

        let identity = self
            .provider
            .create_access_identity()
            .await
            .map_err(|e| Error::Provisioning {
                code: e.code,
                message: e.message,
            })?;

        info!("Using access identity {}", identity.id);
        Ok(identity)
    }
}
