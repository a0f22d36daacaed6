//! Memory store client (agent runtime control plane)

use crate::client::{list_all, required_str, str_field, unwrap_object, ResourceClient};
use crate::transport::{ControlPlane, RpcRequest, Service};
use reconciler_core::{ManagedResource, ResourceKind, ResourceSpec, Result, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Memory statuses: CREATING, ACTIVE, DELETING, FAILED.
const MEMORY_FAILURE_STATUSES: &[&str] = &[StatusCode::FAILED];

/// Event expiry for development environments; everything else keeps events longer.
const DEV_EVENT_EXPIRY_DAYS: u64 = 30;
const DEFAULT_EVENT_EXPIRY_DAYS: u64 = 90;

pub struct MemoryClient {
    rpc: Arc<dyn ControlPlane>,
}

impl MemoryClient {
    pub fn new(rpc: Arc<dyn ControlPlane>) -> Self {
        Self { rpc }
    }

    fn parse(value: &Value) -> Result<ManagedResource> {
        let memory = unwrap_object(value, "memory");
        let id = required_str(memory, &["id", "memoryId"], "memory")?;
        // Summaries may omit the name; ids are "<name>-<suffix>".
        let name = str_field(memory, &["name"]).unwrap_or_else(|| {
            id.rsplit_once('-')
                .map(|(name, _)| name.to_string())
                .unwrap_or_else(|| id.clone())
        });
        let status = str_field(memory, &["status"]).unwrap_or_default();
        let mut resource = ManagedResource::new(id, name, status);
        resource.arn = str_field(memory, &["arn", "memoryArn"]);
        Ok(resource)
    }
}

/// Event expiry declared on the spec, or the environment default.
pub fn event_expiry_days(spec: &ResourceSpec) -> u64 {
    spec.property_u64("EventExpiryDays").unwrap_or(if spec.environment == "development" {
        DEV_EVENT_EXPIRY_DAYS
    } else {
        DEFAULT_EVENT_EXPIRY_DAYS
    })
}

#[async_trait::async_trait]
impl ResourceClient for MemoryClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Memory
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<ManagedResource>> {
        let request = RpcRequest::post(Service::AgentCoreControl, "ListMemories", "/memories/");
        let items = list_all(self.rpc.as_ref(), request, "memories").await?;
        items.iter().map(Self::parse).collect()
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<String> {
        let description = spec
            .property("Description")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Memory store for {} environment", spec.environment));
        let body = json!({
            "name": spec.name,
            "description": description,
            "eventExpiryDuration": event_expiry_days(spec),
            "clientToken": spec.client_token,
            "tags": { "ConfigHash": spec.config_hash.as_str(), "Environment": spec.environment },
        });
        let response = self
            .rpc
            .call(
                RpcRequest::post(Service::AgentCoreControl, "CreateMemory", "/memories/create")
                    .with_body(body),
            )
            .await?;
        let created = Self::parse(&response)?;
        debug!("memory {} created with status {}", created.id, created.status);
        Ok(created.id)
    }

    async fn get(&self, id: &str) -> Result<ManagedResource> {
        let response = self
            .rpc
            .call(RpcRequest::get(
                Service::AgentCoreControl,
                "GetMemory",
                format!("/memories/{id}/details"),
            ))
            .await?;
        Self::parse(&response)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.rpc
            .call(RpcRequest::delete(
                Service::AgentCoreControl,
                "DeleteMemory",
                format!("/memories/{id}/delete"),
            ))
            .await?;
        Ok(())
    }

    fn failure_statuses(&self) -> &[&'static str] {
        MEMORY_FAILURE_STATUSES
    }
}
