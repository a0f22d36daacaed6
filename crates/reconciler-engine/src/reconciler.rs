//! Generic create / update / delete over one `ResourceClient`
//!
//! Every kind runs the same sequence. Kinds that provision more than one
//! remote object plug extra work in through `ProvisionSteps`.

use crate::dispatcher::ResourceHandler;
use crate::poller::StatusPoller;
use crate::resolver::IdentityResolver;
use reconciler_clients::ResourceClient;
use reconciler_core::{
    tolerate_not_found, Error, ManagedResource, PollBudget, Properties, ResourceKind,
    ResourceSpec, Result, StatusCode, SERVICE_TOKEN_KEY,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Attribute listing declared changes an in-place update did not apply.
pub const IGNORED_PROPERTIES_ATTRIBUTE: &str = "IgnoredProperties";

/// Hooks around the generic sequence. All default to no-ops.
#[async_trait::async_trait]
pub trait ProvisionSteps: Send + Sync {
    /// Runs before the remote create. May add links to the spec.
    async fn prepare(&self, _spec: &mut ResourceSpec) -> Result<()> {
        Ok(())
    }

    /// Runs once the resource is ACTIVE, on fresh creates and adoptions alike.
    async fn finish(&self, _resource: &mut ManagedResource, _spec: &ResourceSpec) -> Result<()> {
        Ok(())
    }

    /// Runs before the remote delete.
    async fn before_delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    /// Runs after the resource is confirmed gone.
    async fn after_delete(&self, _id: &str, _properties: &Properties) -> Result<()> {
        Ok(())
    }
}

/// Single-resource kinds.
pub struct NoSteps;

impl ProvisionSteps for NoSteps {}

/// What to do when an update changes anything besides the name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Keep the resource, report the changes under `IgnoredProperties`.
    #[default]
    Report,
    /// Fail the update with `UpdateNotSupported`.
    Reject,
}

pub struct Reconciler {
    client: Arc<dyn ResourceClient>,
    steps: Arc<dyn ProvisionSteps>,
    resolver: IdentityResolver,
    poller: StatusPoller,
    create_budget: PollBudget,
    delete_budget: PollBudget,
    update_policy: UpdatePolicy,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self {
            resolver: IdentityResolver::new(client.clone()),
            poller: StatusPoller::for_client(client.as_ref()),
            client,
            steps: Arc::new(NoSteps),
            create_budget: PollBudget::creation(),
            delete_budget: PollBudget::deletion(),
            update_policy: UpdatePolicy::default(),
        }
    }

    pub fn with_steps(mut self, steps: Arc<dyn ProvisionSteps>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_budgets(mut self, create: PollBudget, delete: PollBudget) -> Self {
        self.create_budget = create;
        self.delete_budget = delete;
        self
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.client.kind()
    }

    async fn wait_active(&self, id: &str) -> Result<ManagedResource> {
        let client = self.client.clone();
        self.poller
            .wait_for_status(
                id,
                StatusCode::ACTIVE,
                move |id| {
                    let client = client.clone();
                    async move { client.get(&id).await }
                },
                self.create_budget,
            )
            .await
    }

    async fn wait_gone(&self, id: &str) -> Result<()> {
        let client = self.client.clone();
        self.poller
            .wait_for_deletion(
                id,
                move |id| {
                    let client = client.clone();
                    async move { client.get(&id).await }
                },
                self.delete_budget,
            )
            .await
    }

    /// Resolve by name, create if absent, wait for ACTIVE.
    pub async fn create(&self, mut spec: ResourceSpec) -> Result<ManagedResource> {
        let kind = self.kind();
        let id = match self.resolver.find(&spec).await? {
            Some(existing) => {
                info!("{} {} already exists as {} ({})", kind, spec.name, existing.id, existing.status);
                existing.id
            }
            None => {
                self.steps.prepare(&mut spec).await?;
                let id = self.client.create(&spec).await?;
                info!("{} {} create started: {}", kind, spec.name, id);
                id
            }
        };
        let mut resource = self.wait_active(&id).await?;
        self.steps.finish(&mut resource, &spec).await?;
        Ok(resource)
    }

    /// Name change replays Create; otherwise re-fetch the prior resource.
    pub async fn update(
        &self,
        spec: ResourceSpec,
        prior_id: &str,
        old_properties: Option<&Properties>,
    ) -> Result<ManagedResource> {
        let kind = self.kind();
        let old_name = old_properties
            .and_then(|p| p.get(kind.name_key()))
            .and_then(|v| v.as_str());
        if old_name.is_some_and(|old| old != spec.name) {
            info!("{} renamed {:?} -> {}, creating replacement", kind, old_name, spec.name);
            return self.create(spec).await;
        }

        let mut resource = match tolerate_not_found(self.client.get(prior_id).await)? {
            Some(resource) => resource,
            None => {
                warn!("{} {} no longer exists, recreating", kind, prior_id);
                return self.create(spec).await;
            }
        };

        let ignored = old_properties
            .map(|old| changed_properties(kind, old, &spec.properties))
            .unwrap_or_default();
        if !ignored.is_empty() {
            if self.update_policy == UpdatePolicy::Reject {
                return Err(Error::UpdateNotSupported { properties: ignored });
            }
            warn!(
                "{} {}: in-place update not supported, ignoring changes to {}",
                kind,
                prior_id,
                ignored.join(", ")
            );
        }
        self.steps.finish(&mut resource, &spec).await?;
        if !ignored.is_empty() {
            resource
                .extra
                .insert(IGNORED_PROPERTIES_ATTRIBUTE.into(), ignored.join(","));
        }
        Ok(resource)
    }

    /// Tear down `prior_id`. A missing or sentinel identity is a no-op.
    pub async fn delete(&self, prior_id: Option<&str>, properties: &Properties) -> Result<()> {
        let kind = self.kind();
        let declared = properties.get(kind.name_key()).and_then(|v| v.as_str());
        let id = match prior_id {
            Some(id) if Some(id) != declared => id,
            _ => {
                info!("{} {:?} was never created, nothing to delete", kind, prior_id.or(declared));
                return Ok(());
            }
        };

        self.steps.before_delete(id).await?;
        if tolerate_not_found(self.client.delete(id).await)?.is_none() {
            warn!("{} {} already absent", kind, id);
        } else {
            info!("{} {} delete started", kind, id);
        }
        self.wait_gone(id).await?;
        self.steps.after_delete(id, properties).await
    }
}

#[async_trait::async_trait]
impl ResourceHandler for Reconciler {
    fn kind(&self) -> ResourceKind {
        Reconciler::kind(self)
    }

    async fn create(&self, spec: ResourceSpec) -> Result<ManagedResource> {
        Reconciler::create(self, spec).await
    }

    async fn update(
        &self,
        spec: ResourceSpec,
        prior_id: &str,
        old_properties: Option<&Properties>,
    ) -> Result<ManagedResource> {
        Reconciler::update(self, spec, prior_id, old_properties).await
    }

    async fn delete(&self, prior_id: Option<&str>, properties: &Properties) -> Result<()> {
        Reconciler::delete(self, prior_id, properties).await
    }
}

/// Declared keys whose value differs between two property bags, name excluded.
pub fn changed_properties(kind: ResourceKind, old: &Properties, new: &Properties) -> Vec<String> {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| k.as_str() != kind.name_key() && k.as_str() != SERVICE_TOKEN_KEY)
        .filter(|k| old.get(k.as_str()) != new.get(k.as_str()))
        .cloned()
        .collect()
}
