//! Publish resolved identities to a parameter store
//!
//! Keys live under `{prefix}/{environment}/`. Publication is best effort: a
//! failed write is logged and the event still succeeds.

use crate::knowledge_base::DATA_SOURCE_ID_ATTRIBUTE;
use reconciler_clients::ParameterSink;
use reconciler_core::{ManagedResource, ResourceKind};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct OutputPublisher {
    sink: Arc<dyn ParameterSink>,
    prefix: String,
}

impl OutputPublisher {
    pub fn new(sink: Arc<dyn ParameterSink>, prefix: impl Into<String>) -> Self {
        Self {
            sink,
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn key(&self, environment: &str, leaf: &str) -> String {
        format!("{}/{}/{}", self.prefix, environment, leaf)
    }

    /// `(leaf, value, description)` triples published for one resource.
    pub fn entries(kind: ResourceKind, resource: &ManagedResource) -> Vec<(&'static str, String, &'static str)> {
        let extra = |key: &str| resource.extra.get(key).filter(|v| !v.is_empty()).cloned();
        let mut entries = Vec::new();
        match kind {
            ResourceKind::Memory => {
                entries.push(("memory-store-id", resource.id.clone(), "AgentCore Memory Store ID"));
            }
            ResourceKind::KnowledgeBase => {
                entries.push(("knowledge-base-id", resource.id.clone(), "Bedrock Knowledge Base ID"));
                if let Some(ds) = extra(DATA_SOURCE_ID_ATTRIBUTE) {
                    entries.push(("data-source-id", ds, "Bedrock Knowledge Base Data Source ID"));
                }
            }
            ResourceKind::RuntimeEndpoint => {
                entries.push((
                    "agent-endpoint-id",
                    resource.id.clone(),
                    "AgentCore Agent Runtime Endpoint ID",
                ));
                if let Some(url) = extra("EndpointUrl") {
                    entries.push(("agent-endpoint-url", url, "AgentCore Agent Runtime Endpoint URL"));
                }
            }
        }
        entries
    }

    pub async fn publish(&self, kind: ResourceKind, environment: &str, resource: &ManagedResource) {
        for (leaf, value, description) in Self::entries(kind, resource) {
            let key = self.key(environment, leaf);
            match self.sink.put_parameter(&key, &value, description).await {
                Ok(()) => debug!("published {} = {}", key, value),
                Err(e) => warn!("failed to publish {}: {}", key, e),
            }
        }
    }
}
