//! Distribution reconciliation
//!
//! Compares the last applied state with the desired inputs and drives the
//! provider through exactly one of create, update or nothing. One call to
//! [`DistributionReconciler::reconcile`] is one pass; it never retries.
//!
//! Updates follow the provider's optimistic-concurrency protocol: the config
//! is fetched together with a version token, the managed fields are overlaid
//! onto it, and the result is submitted with that token. A stale token comes
//! back as [`Error::ConcurrentModification`] and the caller decides whether
//! to run another pass.

use tracing::{debug, info};

use crate::config::DistributionInputs;
use crate::distribution::{BuiltOrigins, DistributionConfig, build_origins, builder};
use crate::error::{Error, Result};
use crate::identity::{AccessIdentityProvisioner, requires_access_identity};
use crate::origin::{NormalizedOrigin, parse_origins};
use crate::traits::{AccessIdentity, DistributionProvider, DistributionState, DistributionSummary};

/// What a pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    Unchanged,
}

/// Result of one pass
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub action: ReconcileAction,
    /// State to persist
    pub state: DistributionState,
}

/// Drives one distribution towards its desired inputs
pub struct DistributionReconciler<'a> {
    provider: &'a dyn DistributionProvider,
}

impl<'a> DistributionReconciler<'a> {
    pub fn new(provider: &'a dyn DistributionProvider) -> Self {
        Self { provider }
    }

    /// Run one reconciliation pass
    ///
    /// Input errors are raised before any provider call. Nothing is
    /// persisted here; the returned state is for the caller to store.
    pub async fn reconcile(
        &self,
        previous: Option<&DistributionState>,
        desired: &DistributionInputs,
    ) -> Result<Reconciliation> {
        let origins = parse_origins(&desired.origins)?;
        builder::validate_origins(&origins)?;

        match previous.filter(|state| state.is_deployed()) {
            None => self.create(&origins, desired).await,
            Some(previous) if is_unchanged(previous, &origins, desired) => {
                debug!("Distribution {} is up to date", previous.id);
                let mut state = previous.clone();
                state.region = desired.region.clone();
                Ok(Reconciliation {
                    action: ReconcileAction::Unchanged,
                    state,
                })
            }
            Some(previous) => self.update(previous, &origins, desired).await,
        }
    }

    async fn create(
        &self,
        origins: &[NormalizedOrigin],
        desired: &DistributionInputs,
    ) -> Result<Reconciliation> {
        let built = self.build(origins, desired).await?;
        let config = DistributionConfig::new(
            caller_reference(),
            desired.comment.clone(),
            desired.enabled,
            built,
        );

        debug!(
            "Creating distribution with {} origin(s)",
            config.origins.len()
        );
        let summary = self
            .provider
            .create_distribution(&config)
            .await
            .map_err(|e| Error::provider(self.provider.provider_name(), e.code, e.message))?;

        info!("Created distribution {}", summary.id);
        Ok(Reconciliation {
            action: ReconcileAction::Created,
            state: applied_state(&summary, desired),
        })
    }

    async fn update(
        &self,
        previous: &DistributionState,
        origins: &[NormalizedOrigin],
        desired: &DistributionInputs,
    ) -> Result<Reconciliation> {
        let id = previous.id.as_str();
        let provider_name = self.provider.provider_name();
        let built = self.build(origins, desired).await?;

        debug!("Fetching config of distribution {}", id);
        let fetched = self
            .provider
            .get_distribution_config(id)
            .await
            .map_err(|e| Error::from_provider(provider_name, id, e))?;

        let mut request = fetched.into_update(id);
        request.config.apply(desired.enabled, &desired.comment, built);

        debug!(
            "Updating distribution {} (if-match {})",
            id, request.if_match
        );
        let summary = self
            .provider
            .update_distribution(&request)
            .await
            .map_err(|e| Error::from_provider(provider_name, id, e))?;

        info!("Updated distribution {}", summary.id);
        Ok(Reconciliation {
            action: ReconcileAction::Updated,
            state: applied_state(&summary, desired),
        })
    }

    /// Provision the identity when needed, then build origins and behaviors
    async fn build(
        &self,
        origins: &[NormalizedOrigin],
        desired: &DistributionInputs,
    ) -> Result<BuiltOrigins> {
        let identity: Option<AccessIdentity> = if requires_access_identity(origins) {
            // State does not record the identity id, and the hint is
            // advisory only: every pass that needs the identity asks for it
            Some(
                AccessIdentityProvisioner::new(self.provider)
                    .ensure(None)
                    .await?,
            )
        } else {
            None
        };

        build_origins(origins, identity.as_ref(), desired.defaults.as_ref())
    }
}

/// Whether `previous` already reflects `desired`
///
/// Origins are compared after normalization so that equivalent spellings of
/// the same URL do not trigger an update. The comment is not compared.
fn is_unchanged(
    previous: &DistributionState,
    origins: &[NormalizedOrigin],
    desired: &DistributionInputs,
) -> bool {
    if previous.enabled != desired.enabled || previous.defaults != desired.defaults {
        return false;
    }
    match parse_origins(&previous.origins) {
        Ok(applied) => applied == origins,
        Err(_) => false,
    }
}

fn applied_state(summary: &DistributionSummary, desired: &DistributionInputs) -> DistributionState {
    DistributionState {
        id: summary.id.clone(),
        arn: summary.arn.clone(),
        url: summary.url(),
        region: desired.region.clone(),
        enabled: desired.enabled,
        origins: desired.origins.clone(),
        defaults: desired.defaults.clone(),
        comment: desired.comment.clone(),
        last_applied: chrono::Utc::now(),
    }
}

fn caller_reference() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
