//! Distribution engine
//!
//! The DistributionEngine is responsible for:
//! - Loading the last applied state of a named distribution
//! - Running reconciliation and decommission passes
//! - Persisting state after successful passes only
//! - Restarting a pass that lost a concurrent-modification race
//!
//! ## Architecture
//!
//! ```text
//!                       ┌────────────────────┐
//!   deploy / remove ───▶│ DistributionEngine │
//!                       └────────────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//! ┌──────────────┐      ┌──────────────────┐      ┌─────────────┐
//! │ StateStore   │      │ Reconciler /     │      │   Events    │
//! │ (load, save) │      │ Decommissioner   │      │  (notify)   │
//! └──────────────┘      └──────────────────┘      └─────────────┘
//!                                 │
//!                                 ▼
//!                     ┌──────────────────────┐
//!                     │ DistributionProvider │
//!                     └──────────────────────┘
//! ```
//!
//! ## Deploy Flow
//!
//! 1. Load state from the StateStore
//! 2. Reconcile against the desired inputs
//! 3. On success, persist and flush the new state
//! 4. On a concurrent modification, wait and start again from step 1
//! 5. Emit events for monitoring/logging

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{DistributionInputs, EngineConfig};
use crate::decommission::{Decommission, DistributionDecommissioner};
use crate::error::Result;
use crate::reconciler::{DistributionReconciler, ReconcileAction};
use crate::traits::{DistributionProvider, DistributionState, StateStore};

/// Events emitted by the DistributionEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Deploy pass started
    DeployStarted { name: String },

    /// Distribution created
    DistributionCreated { name: String, id: String, url: String },

    /// Distribution updated
    DistributionUpdated { name: String, id: String },

    /// No change was needed
    DistributionUnchanged { name: String, id: String },

    /// A pass lost a concurrent-modification race and will run again
    PassRetried { name: String, attempt: usize },

    /// Deploy failed
    DeployFailed { name: String, error: String },

    /// Remove started
    RemoveStarted { name: String },

    /// Distribution disabled; it has to be removed again to delete it
    DistributionDisabled { name: String, id: String },

    /// Distribution deleted
    DistributionDeleted { name: String, id: String },

    /// Nothing to remove
    RemoveSkipped { name: String },

    /// Remove failed
    RemoveFailed { name: String, error: String },
}

/// Outcome of [`DistributionEngine::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Deleted and state cleared
    Deleted,
    /// Disabled; state kept with `enabled = false`
    Disabled,
    /// No deployed distribution was recorded
    Skipped,
}

/// Core distribution engine
///
/// Owns one provider and one state store and runs passes against them. A
/// pass is a single reconcile or decommission; the engine adds persistence,
/// bounded pass restarts and events around it.
///
/// ## Lifecycle
///
/// 1. Create with [`DistributionEngine::new()`]
/// 2. Call [`deploy()`](DistributionEngine::deploy) or
///    [`remove()`](DistributionEngine::remove) as often as needed
/// 3. Drop to cleanup
///
/// ## Event channel
///
/// Events go to a bounded channel. When it is full, events are dropped with
/// a warning rather than blocking a pass.
pub struct DistributionEngine {
    /// CDN provider
    provider: Box<dyn DistributionProvider>,

    /// Last applied state
    state_store: Box<dyn StateStore>,

    /// How many times a pass may be restarted
    max_pass_retries: usize,

    /// Delay between restarted passes (in milliseconds)
    pass_retry_delay_ms: u64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DistributionEngine {
    /// Create a new distribution engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Box<dyn DistributionProvider>,
        state_store: Box<dyn StateStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            provider,
            state_store,
            max_pass_retries: config.max_pass_retries,
            pass_retry_delay_ms: config.pass_retry_delay_ms,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Bring distribution `name` to the desired inputs
    ///
    /// Returns the state that was persisted. A failed pass persists nothing.
    pub async fn deploy(&self, name: &str, inputs: &DistributionInputs) -> Result<DistributionState> {
        self.emit_event(EngineEvent::DeployStarted {
            name: name.to_string(),
        });

        let mut attempt = 0;
        loop {
            match self.deploy_pass(name, inputs).await {
                Ok(state) => return Ok(state),
                Err(e) if e.is_concurrent_modification() && attempt < self.max_pass_retries => {
                    attempt += 1;
                    warn!(
                        "Pass {} for {} lost a concurrent modification: {}",
                        attempt, name, e
                    );
                    self.emit_event(EngineEvent::PassRetried {
                        name: name.to_string(),
                        attempt,
                    });
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        self.pass_retry_delay_ms,
                    ))
                    .await;
                }
                Err(e) => {
                    error!("Deploy of {} failed: {}", name, e);
                    self.emit_event(EngineEvent::DeployFailed {
                        name: name.to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }
    }

    async fn deploy_pass(&self, name: &str, inputs: &DistributionInputs) -> Result<DistributionState> {
        let previous = self.state_store.get_state(name).await?;

        let reconciliation = DistributionReconciler::new(self.provider.as_ref())
            .reconcile(previous.as_ref(), inputs)
            .await?;
        let state = reconciliation.state;

        match reconciliation.action {
            ReconcileAction::Created => {
                info!("Created {} as {} ({})", name, state.id, state.url);
                self.emit_event(EngineEvent::DistributionCreated {
                    name: name.to_string(),
                    id: state.id.clone(),
                    url: state.url.clone(),
                });
            }
            ReconcileAction::Updated => {
                info!("Updated {} ({})", name, state.id);
                self.emit_event(EngineEvent::DistributionUpdated {
                    name: name.to_string(),
                    id: state.id.clone(),
                });
            }
            ReconcileAction::Unchanged => {
                debug!("{} unchanged", name);
                self.emit_event(EngineEvent::DistributionUnchanged {
                    name: name.to_string(),
                    id: state.id.clone(),
                });
            }
        }

        self.state_store.set_state(name, &state).await?;
        self.state_store.flush().await?;
        Ok(state)
    }

    /// Tear down distribution `name`
    ///
    /// An enabled distribution is only disabled by this call; run it again
    /// once the disable has propagated to delete it.
    pub async fn remove(&self, name: &str) -> Result<RemoveOutcome> {
        self.emit_event(EngineEvent::RemoveStarted {
            name: name.to_string(),
        });

        match self.remove_pass(name).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Remove of {} failed: {}", name, e);
                self.emit_event(EngineEvent::RemoveFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn remove_pass(&self, name: &str) -> Result<RemoveOutcome> {
        let state = match self.state_store.get_state(name).await? {
            Some(state) if state.is_deployed() => state,
            _ => {
                debug!("No deployed distribution recorded for {}, skipping", name);
                self.emit_event(EngineEvent::RemoveSkipped {
                    name: name.to_string(),
                });
                return Ok(RemoveOutcome::Skipped);
            }
        };

        let outcome = DistributionDecommissioner::new(self.provider.as_ref())
            .decommission(&state.id)
            .await?;

        match outcome {
            Decommission::Deleted => {
                self.state_store.delete_state(name).await?;
                self.state_store.flush().await?;
                self.emit_event(EngineEvent::DistributionDeleted {
                    name: name.to_string(),
                    id: state.id,
                });
                Ok(RemoveOutcome::Deleted)
            }
            Decommission::Disabled => {
                let id = state.id.clone();
                let disabled = DistributionState {
                    enabled: false,
                    last_applied: chrono::Utc::now(),
                    ..state
                };
                self.state_store.set_state(name, &disabled).await?;
                self.state_store.flush().await?;
                self.emit_event(EngineEvent::DistributionDisabled {
                    name: name.to_string(),
                    id,
                });
                Ok(RemoveOutcome::Disabled)
            }
        }
    }

    /// Read the recorded state of `name`
    pub async fn state(&self, name: &str) -> Result<Option<DistributionState>> {
        self.state_store.get_state(name).await
    }

    fn emit_event(&self, event: EngineEvent) {
        // Full channel: the consumer is behind, drop rather than block the pass
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
