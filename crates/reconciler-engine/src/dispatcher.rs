//! Event dispatch
//!
//! Routes one lifecycle event to the handler for its kind and packages the
//! outcome. This is the only place an error becomes a FAILED response.

use crate::config::ReconcilerConfig;
use crate::knowledge_base::KnowledgeBaseSteps;
use crate::outputs::OutputPublisher;
use crate::reconciler::Reconciler;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reconciler_clients::{
    ControlPlane, DataSourceApi, KnowledgeBaseClient, MemoryClient, ParameterStoreClient,
    RoleClient, RuntimeEndpointClient,
};
use reconciler_core::{
    ConfigHash, Error, LifecycleEvent, LifecycleResponse, ManagedResource, Properties,
    RequestType, ResourceKind, ResourceSpec, Result, CONFIG_HASH_KEY,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Lifecycle operations for one resource kind.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn create(&self, spec: ResourceSpec) -> Result<ManagedResource>;

    async fn update(
        &self,
        spec: ResourceSpec,
        prior_id: &str,
        old_properties: Option<&Properties>,
    ) -> Result<ManagedResource>;

    async fn delete(&self, prior_id: Option<&str>, properties: &Properties) -> Result<()>;
}

/// Builds the handler for a kind on first use.
pub type HandlerFactory =
    Box<dyn Fn(ResourceKind) -> Result<Arc<dyn ResourceHandler>> + Send + Sync>;

pub struct Dispatcher {
    factory: HandlerFactory,
    handlers: DashMap<ResourceKind, Arc<dyn ResourceHandler>>,
    outputs: Option<OutputPublisher>,
    kind_override: Option<ResourceKind>,
}

impl Dispatcher {
    pub fn new(
        factory: impl Fn(ResourceKind) -> Result<Arc<dyn ResourceHandler>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            handlers: DashMap::new(),
            outputs: None,
            kind_override: None,
        }
    }

    /// Dispatcher whose handlers talk to `rpc` with the configured budgets,
    /// storage backend, and update policy.
    pub fn from_config(config: &ReconcilerConfig, rpc: Arc<dyn ControlPlane>) -> Self {
        let outputs = config.outputs.enabled.then(|| {
            OutputPublisher::new(
                Arc::new(ParameterStoreClient::new(rpc.clone())),
                config.outputs.prefix.clone(),
            )
        });
        let config = config.clone();
        let mut dispatcher = Self::new(move |kind| Ok(build_handler(&config, rpc.clone(), kind)));
        dispatcher.outputs = outputs;
        dispatcher
    }

    pub fn with_outputs(mut self, outputs: OutputPublisher) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Route every event to `kind`, whatever its `ResourceType` says.
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind_override = Some(kind);
        self
    }

    /// The memoized handler for `kind`, built on first request.
    pub fn handler(&self, kind: ResourceKind) -> Result<Arc<dyn ResourceHandler>> {
        match self.handlers.entry(kind) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let handler = (self.factory)(kind)?;
                info!("{} handler initialized", kind);
                Ok(entry.insert(handler).clone())
            }
        }
    }

    /// Kind from the override, the event's `ResourceType`, or the one name
    /// property present.
    pub fn resolve_kind(&self, event: &LifecycleEvent) -> Result<ResourceKind> {
        if let Some(kind) = self.kind_override {
            return Ok(kind);
        }
        if let Some(resource_type) = event.resource_type.as_deref() {
            return ResourceKind::from_resource_type(resource_type).ok_or_else(|| {
                Error::invalid_event(format!("unsupported resource type {resource_type}"))
            });
        }
        let mut candidates = ResourceKind::ALL
            .into_iter()
            .filter(|k| event.resource_properties.contains_key(k.name_key()));
        match (candidates.next(), candidates.next()) {
            (Some(kind), None) => Ok(kind),
            _ => Err(Error::invalid_event(
                "cannot determine resource kind: no ResourceType and no unique name property",
            )),
        }
    }

    /// Handle one event. Never fails: errors come back as a FAILED response.
    pub async fn dispatch(&self, event: &LifecycleEvent) -> LifecycleResponse {
        // A failed Create reported a fallback identity; its Delete has nothing
        // to tear down, whatever the event's kind.
        if event.request_type == RequestType::Delete && never_created(event) {
            let id = fallback_identity(event);
            info!("Delete of {} which was never created, nothing to do", id);
            return LifecycleResponse::success(id, BTreeMap::new()).correlate(event);
        }

        let kind = self.resolve_kind(event);
        info!(
            "{} {} (prior id {:?})",
            event.request_type,
            kind.as_ref().map(|k| k.resource_type()).unwrap_or("unknown"),
            event.prior_identity()
        );

        let outcome = match kind {
            Ok(kind) => self.handle(kind, event).await,
            Err(e) => Err(e),
        };
        let response = match outcome {
            Ok((id, data)) => {
                info!("{} succeeded: {}", event.request_type, id);
                LifecycleResponse::success(id, data)
            }
            Err(e) => {
                let id = fallback_identity(event);
                error!("{} failed for {}: {}", event.request_type, id, e);
                LifecycleResponse::failed(id, e.to_string())
            }
        };
        response.correlate(event)
    }

    async fn handle(
        &self,
        kind: ResourceKind,
        event: &LifecycleEvent,
    ) -> Result<(String, BTreeMap<String, String>)> {
        match event.request_type {
            RequestType::Create => {
                let spec = new_spec(kind, &event.resource_properties)?;
                let handler = self.handler(kind)?;
                let config_hash = spec.config_hash.clone();
                let environment = spec.environment.clone();
                let resource = handler.create(spec).await?;
                self.publish(kind, &environment, &resource).await;
                Ok((resource.id.clone(), attributes(kind, &resource, &config_hash)))
            }
            RequestType::Update => {
                let spec = new_spec(kind, &event.resource_properties)?;
                let prior_id = event
                    .prior_identity()
                    .ok_or_else(|| Error::invalid_event("Update without PhysicalResourceId"))?;
                let handler = self.handler(kind)?;
                let config_hash = spec.config_hash.clone();
                let environment = spec.environment.clone();
                let resource = handler
                    .update(spec, prior_id, event.old_resource_properties.as_ref())
                    .await?;
                self.publish(kind, &environment, &resource).await;
                Ok((resource.id.clone(), attributes(kind, &resource, &config_hash)))
            }
            RequestType::Delete => {
                let handler = self.handler(kind)?;
                handler
                    .delete(event.prior_identity(), &event.resource_properties)
                    .await?;
                Ok((fallback_identity(event), BTreeMap::new()))
            }
        }
    }

    async fn publish(&self, kind: ResourceKind, environment: &str, resource: &ManagedResource) {
        if let Some(outputs) = &self.outputs {
            outputs.publish(kind, environment, resource).await;
        }
    }
}

fn build_handler(
    config: &ReconcilerConfig,
    rpc: Arc<dyn ControlPlane>,
    kind: ResourceKind,
) -> Arc<dyn ResourceHandler> {
    let reconciler = match kind {
        ResourceKind::Memory => Reconciler::new(Arc::new(MemoryClient::new(rpc))),
        ResourceKind::RuntimeEndpoint => Reconciler::new(Arc::new(RuntimeEndpointClient::new(rpc))),
        ResourceKind::KnowledgeBase => {
            let kb = &config.knowledge_base;
            let client = Arc::new(KnowledgeBaseClient::new(
                rpc.clone(),
                kb.embedding_model_arn(&config.control_plane.region),
                kb.storage.clone(),
            ));
            let data_sources: Arc<dyn DataSourceApi> = client.clone();
            let steps = KnowledgeBaseSteps::new(
                Arc::new(RoleClient::new(rpc)),
                data_sources,
                kb.settings(&config.control_plane),
            );
            Reconciler::new(client).with_steps(Arc::new(steps))
        }
    };
    Arc::new(
        reconciler
            .with_budgets(config.poll.create_budget(), config.poll.delete_budget())
            .with_update_policy(config.update.policy()),
    )
}

fn new_spec(kind: ResourceKind, properties: &Properties) -> Result<ResourceSpec> {
    ResourceSpec::from_properties(kind, properties, uuid::Uuid::new_v4().to_string())
}

/// Best identity known for an event: the prior id, else the declared name.
pub fn fallback_identity(event: &LifecycleEvent) -> String {
    event
        .prior_identity()
        .or_else(|| {
            ResourceKind::ALL
                .into_iter()
                .find_map(|k| event.declared(k.name_key()).filter(|s| !s.is_empty()))
        })
        .or(event.logical_resource_id.as_deref())
        .unwrap_or("unknown")
        .to_string()
}

/// True when the prior identity is absent or one `fallback_identity` would
/// have reported for a failed Create.
fn never_created(event: &LifecycleEvent) -> bool {
    let Some(prior) = event.prior_identity() else {
        return true;
    };
    prior == "unknown"
        || event.logical_resource_id.as_deref() == Some(prior)
        || ResourceKind::ALL
            .into_iter()
            .any(|k| event.declared(k.name_key()) == Some(prior))
}

/// Attribute bag returned on success.
pub fn attributes(
    kind: ResourceKind,
    resource: &ManagedResource,
    config_hash: &ConfigHash,
) -> BTreeMap<String, String> {
    let mut data = resource.extra.clone();
    data.insert(kind.id_attribute().into(), resource.id.clone());
    if let Some(arn) = &resource.arn {
        data.insert(kind.arn_attribute().into(), arn.clone());
    }
    data.insert("Status".into(), resource.status.to_string());
    data.insert(CONFIG_HASH_KEY.into(), config_hash.to_string());
    data
}
