//! Distribution teardown
//!
//! A provider refuses to delete a distribution that is still enabled. When
//! that happens the distribution is disabled instead and the caller is told
//! so; the actual delete has to wait for a later pass, once the disable has
//! propagated.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{DeleteRequest, DistributionProvider, DistributionSummary, ProviderErrorKind};

/// Outcome of a decommission call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decommission {
    /// The distribution is gone
    Deleted,
    /// The distribution was enabled and has been disabled; delete again later
    Disabled,
}

/// Deletes distributions, disabling them first when required
pub struct DistributionDecommissioner<'a> {
    provider: &'a dyn DistributionProvider,
}

impl<'a> DistributionDecommissioner<'a> {
    pub fn new(provider: &'a dyn DistributionProvider) -> Self {
        Self { provider }
    }

    /// Delete distribution `id`, or disable it if it is still enabled
    pub async fn decommission(&self, id: &str) -> Result<Decommission> {
        let provider_name = self.provider.provider_name();

        debug!("Fetching version token of distribution {}", id);
        let fetched = self
            .provider
            .get_distribution_config(id)
            .await
            .map_err(|e| Error::from_provider(provider_name, id, e))?;

        let request = DeleteRequest::new(id, fetched.version_token);
        match self.provider.delete_distribution(&request).await {
            Ok(()) => {
                info!("Deleted distribution {}", id);
                Ok(Decommission::Deleted)
            }
            Err(err) if err.kind == ProviderErrorKind::NotDisabled => {
                warn!(
                    "Distribution {} is still enabled ({}); disabling it",
                    id, err.code
                );
                self.disable(id).await?;
                info!("Disabled distribution {}", id);
                Ok(Decommission::Disabled)
            }
            Err(err) => Err(Error::from_provider(provider_name, id, err)),
        }
    }

    async fn disable(&self, id: &str) -> Result<DistributionSummary> {
        let provider_name = self.provider.provider_name();

        let fetched = self
            .provider
            .get_distribution_config(id)
            .await
            .map_err(|e| Error::from_provider(provider_name, id, e))?;

        let mut request = fetched.into_update(id);
        request.config.enabled = false;

        self.provider
            .update_distribution(&request)
            .await
            .map_err(|e| Error::from_provider(provider_name, id, e))
    }
}
