//! Test doubles and common utilities for contract tests
//!
//! `MockDistributionProvider` keeps an in-memory set of distributions with
//! real version-token semantics, records every call in order and can be
//! scripted to fail the next call of a given kind.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cdn_core::config::{DistributionInputs, EngineConfig};
use cdn_core::distribution::DistributionConfig;
use cdn_core::origin::{OriginDescriptor, OriginInput};
use cdn_core::traits::{
    AccessIdentity, DeleteRequest, DistributionProvider, DistributionSummary, ProviderError,
    ProviderErrorKind, UpdateRequest, VersionedConfig,
};

pub const MOCK_IDENTITY_ID: &str = "E3OAIMOCKEXAMPLE";

/// Provider calls, in the order they were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateDistribution,
    GetDistributionConfig { id: String },
    UpdateDistribution { id: String, if_match: String },
    DeleteDistribution { id: String, if_match: String },
    CreateAccessIdentity,
}

/// Which call a scripted failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Get,
    Update,
    Delete,
    Identity,
}

#[derive(Debug, Clone)]
struct StoredDistribution {
    config: DistributionConfig,
    version: usize,
    domain_name: String,
}

impl StoredDistribution {
    fn token(&self) -> String {
        format!("ETAG{}", self.version)
    }
}

#[derive(Default)]
struct MockInner {
    distributions: HashMap<String, StoredDistribution>,
    calls: Vec<Call>,
    created: Vec<DistributionConfig>,
    updates: Vec<UpdateRequest>,
    fetched_tokens: Vec<String>,
    failures: HashMap<Op, VecDeque<ProviderError>>,
}

/// A recording provider with version-token semantics
///
/// Clones share all state, so a test can keep one handle and give the
/// engine another.
#[derive(Clone, Default)]
pub struct MockDistributionProvider {
    inner: Arc<Mutex<MockInner>>,
    next_id: Arc<AtomicUsize>,
    identity_calls: Arc<AtomicUsize>,
}

impl MockDistributionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of kind `op` fail with `err`
    pub fn fail_next(&self, op: Op, err: ProviderError) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Add an existing distribution, as if created out of band
    pub fn seed(&self, id: &str, config: DistributionConfig) {
        self.inner.lock().unwrap().distributions.insert(
            id.to_string(),
            StoredDistribution {
                config,
                version: 1,
                domain_name: format!("{}.cloudfront.net", id.to_lowercase()),
            },
        );
    }

    /// Simulate another writer changing distribution `id`
    pub fn touch(&self, id: &str) {
        if let Some(stored) = self.inner.lock().unwrap().distributions.get_mut(id) {
            stored.version += 1;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn created_configs(&self) -> Vec<DistributionConfig> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn update_requests(&self) -> Vec<UpdateRequest> {
        self.inner.lock().unwrap().updates.clone()
    }

    /// Version tokens handed out by get_distribution_config, in order
    pub fn fetched_tokens(&self) -> Vec<String> {
        self.inner.lock().unwrap().fetched_tokens.clone()
    }

    pub fn current_config(&self, id: &str) -> Option<DistributionConfig> {
        self.inner
            .lock()
            .unwrap()
            .distributions
            .get(id)
            .map(|d| d.config.clone())
    }

    pub fn distribution_count(&self) -> usize {
        self.inner.lock().unwrap().distributions.len()
    }

    pub fn identity_call_count(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    /// Number of calls that change remote state
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::CreateDistribution
                        | Call::UpdateDistribution { .. }
                        | Call::DeleteDistribution { .. }
                )
            })
            .count()
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| f(c)).count()
    }

    fn record(&self, call: Call, op: Op) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        match inner.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn summary(id: &str, stored: &StoredDistribution) -> DistributionSummary {
        DistributionSummary {
            id: id.to_string(),
            arn: format!("arn:aws:cloudfront::123456789012:distribution/{}", id),
            domain_name: stored.domain_name.clone(),
        }
    }
}

fn not_found(id: &str) -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::NotFound,
        "NoSuchDistribution",
        format!("The specified distribution does not exist: {}", id),
    )
}

fn stale_token() -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::Conflict,
        "PreconditionFailed",
        "The If-Match version is missing or not valid",
    )
}

#[async_trait::async_trait]
impl DistributionProvider for MockDistributionProvider {
    async fn create_distribution(
        &self,
        config: &DistributionConfig,
    ) -> Result<DistributionSummary, ProviderError> {
        self.record(Call::CreateDistribution, Op::Create)?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("EDFDVBD6EXAMPLE{}", n);
        let stored = StoredDistribution {
            config: config.clone(),
            version: 1,
            domain_name: format!("d{}abcdef8.cloudfront.net", n),
        };
        let summary = Self::summary(&id, &stored);

        let mut inner = self.inner.lock().unwrap();
        inner.created.push(config.clone());
        inner.distributions.insert(id, stored);
        Ok(summary)
    }

    async fn get_distribution_config(&self, id: &str) -> Result<VersionedConfig, ProviderError> {
        self.record(
            Call::GetDistributionConfig { id: id.to_string() },
            Op::Get,
        )?;

        let mut inner = self.inner.lock().unwrap();
        let stored = inner.distributions.get(id).cloned().ok_or_else(|| not_found(id))?;
        inner.fetched_tokens.push(stored.token());
        Ok(VersionedConfig {
            version_token: stored.token(),
            config: stored.config,
        })
    }

    async fn update_distribution(
        &self,
        request: &UpdateRequest,
    ) -> Result<DistributionSummary, ProviderError> {
        self.record(
            Call::UpdateDistribution {
                id: request.id.clone(),
                if_match: request.if_match.clone(),
            },
            Op::Update,
        )?;

        let mut inner = self.inner.lock().unwrap();
        inner.updates.push(request.clone());
        let stored = inner
            .distributions
            .get_mut(&request.id)
            .ok_or_else(|| not_found(&request.id))?;
        if stored.token() != request.if_match {
            return Err(stale_token());
        }
        stored.version += 1;
        stored.config = request.config.clone();
        Ok(Self::summary(&request.id, stored))
    }

    async fn delete_distribution(&self, request: &DeleteRequest) -> Result<(), ProviderError> {
        self.record(
            Call::DeleteDistribution {
                id: request.id.clone(),
                if_match: request.if_match.clone(),
            },
            Op::Delete,
        )?;

        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .distributions
            .get(&request.id)
            .ok_or_else(|| not_found(&request.id))?;
        if stored.token() != request.if_match {
            return Err(stale_token());
        }
        if stored.config.enabled {
            return Err(ProviderError::new(
                ProviderErrorKind::NotDisabled,
                "DistributionNotDisabled",
                "The distribution you are trying to delete has not been disabled.",
            ));
        }
        inner.distributions.remove(&request.id);
        Ok(())
    }

    async fn create_access_identity(&self) -> Result<AccessIdentity, ProviderError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        self.record(Call::CreateAccessIdentity, Op::Identity)?;
        Ok(AccessIdentity {
            id: MOCK_IDENTITY_ID.to_string(),
            canonical_user_id: "b970b42360b81c8ddbd79d2f5df0069ba9033c8a79655752abe380cd6d63ba8bcf23384d568fcf89fc49700b5e11a0fd".to_string(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Inputs with a single public bucket origin
pub fn bucket_inputs(bucket: &str) -> DistributionInputs {
    DistributionInputs::new(vec![OriginInput::Url(format!(
        "https://{}.s3.amazonaws.com",
        bucket
    ))])
}

/// Inputs with a single private bucket origin
pub fn private_bucket_inputs(bucket: &str) -> DistributionInputs {
    DistributionInputs::new(vec![
        OriginDescriptor::new(format!("https://{}.s3.amazonaws.com", bucket))
            .with_private(true)
            .into(),
    ])
}

/// Engine settings that keep tests fast
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        max_pass_retries: 2,
        pass_retry_delay_ms: 1,
        event_channel_capacity: 100,
    }
}

/// Drain all events currently in the channel
pub fn drain_events<T>(rx: &mut tokio::sync::mpsc::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
