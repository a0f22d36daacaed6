//! Runtime endpoint client (agent runtime control plane)
//!
//! Endpoints live under an agent runtime and are addressed by name, so the id
//! this client hands out is `<runtime-id>/<endpoint-name>`.

use crate::client::{list_all, str_field, unwrap_object, ResourceClient};
use crate::transport::{ControlPlane, RpcRequest, Service};
use reconciler_core::{Error, ManagedResource, ResourceKind, ResourceSpec, Result};
use serde_json::{json, Value};
use std::sync::Arc;

/// Declared property naming the parent runtime.
pub const RUNTIME_ID_KEY: &str = "AgentRuntimeId";

/// Composite identity of an endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointRef {
    pub runtime_id: String,
    pub name: String,
}

impl EndpointRef {
    pub fn new(runtime_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            runtime_id: runtime_id.into(),
            name: name.into(),
        }
    }

    fn path(&self) -> String {
        format!("/runtimes/{}/runtime-endpoints/{}/", self.runtime_id, self.name)
    }
}

impl std::fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.runtime_id, self.name)
    }
}

impl std::str::FromStr for EndpointRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((runtime_id, name)) if !runtime_id.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(runtime_id, name))
            }
            _ => Err(Error::validation(format!(
                "endpoint id {s:?} is not <runtime-id>/<endpoint-name>"
            ))),
        }
    }
}

pub struct RuntimeEndpointClient {
    rpc: Arc<dyn ControlPlane>,
}

impl RuntimeEndpointClient {
    pub fn new(rpc: Arc<dyn ControlPlane>) -> Self {
        Self { rpc }
    }

    fn parse(runtime_id: &str, value: &Value) -> Result<ManagedResource> {
        let ep = unwrap_object(value, "agentRuntimeEndpoint");
        let name = str_field(ep, &["name", "endpointName"]).ok_or_else(|| {
            Error::InvalidResponse("runtime endpoint: missing name".into())
        })?;
        let status = str_field(ep, &["status"]).unwrap_or_default();
        let id = EndpointRef::new(runtime_id, &name).to_string();
        let mut resource = ManagedResource::new(id, name.clone(), status)
            .with_extra("EndpointName", name)
            .with_extra(RUNTIME_ID_KEY, runtime_id);
        resource.arn = str_field(ep, &["agentRuntimeEndpointArn", "arn"]);
        if let Some(url) = str_field(ep, &["liveEndpointUrl", "endpointUrl"]) {
            resource.extra.insert("EndpointUrl".into(), url);
        }
        if let Some(version) = str_field(ep, &["liveVersion"]) {
            resource.extra.insert("LiveVersion".into(), version);
        }
        Ok(resource)
    }
}

#[async_trait::async_trait]
impl ResourceClient for RuntimeEndpointClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RuntimeEndpoint
    }

    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<ManagedResource>> {
        let runtime_id = spec.require(RUNTIME_ID_KEY)?;
        let request = RpcRequest::post(
            Service::AgentCoreControl,
            "ListAgentRuntimeEndpoints",
            format!("/runtimes/{runtime_id}/runtime-endpoints/"),
        );
        let items = list_all(self.rpc.as_ref(), request, "runtimeEndpoints").await?;
        items.iter().map(|v| Self::parse(runtime_id, v)).collect()
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<String> {
        let runtime_id = spec.require(RUNTIME_ID_KEY)?;
        let description = spec
            .property("Description")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Endpoint for {} environment", spec.environment));
        let mut body = json!({
            "name": spec.name,
            "description": description,
            "clientToken": spec.client_token,
            "tags": { "ConfigHash": spec.config_hash.as_str(), "Environment": spec.environment },
        });
        if let Some(version) = spec.property("TargetVersion") {
            body["agentRuntimeVersion"] = json!(version);
        }
        self.rpc
            .call(
                RpcRequest::put(
                    Service::AgentCoreControl,
                    "CreateAgentRuntimeEndpoint",
                    format!("/runtimes/{runtime_id}/runtime-endpoints/"),
                )
                .with_body(body),
            )
            .await?;
        Ok(EndpointRef::new(runtime_id, &spec.name).to_string())
    }

    async fn get(&self, id: &str) -> Result<ManagedResource> {
        let endpoint: EndpointRef = id.parse()?;
        let response = self
            .rpc
            .call(RpcRequest::get(
                Service::AgentCoreControl,
                "GetAgentRuntimeEndpoint",
                endpoint.path(),
            ))
            .await?;
        Self::parse(&endpoint.runtime_id, &response)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let endpoint: EndpointRef = id.parse()?;
        self.rpc
            .call(RpcRequest::delete(
                Service::AgentCoreControl,
                "DeleteAgentRuntimeEndpoint",
                endpoint.path(),
            ))
            .await?;
        Ok(())
    }
}
