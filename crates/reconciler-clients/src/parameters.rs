//! Parameter store client, the write-only sink for published outputs

use crate::client::ParameterSink;
use crate::transport::{ControlPlane, RpcRequest, Service};
use reconciler_core::Result;
use serde_json::json;
use std::sync::Arc;

pub struct ParameterStoreClient {
    rpc: Arc<dyn ControlPlane>,
}

impl ParameterStoreClient {
    pub fn new(rpc: Arc<dyn ControlPlane>) -> Self {
        Self { rpc }
    }
}

#[async_trait::async_trait]
impl ParameterSink for ParameterStoreClient {
    async fn put_parameter(&self, name: &str, value: &str, description: &str) -> Result<()> {
        self.rpc
            .call(
                RpcRequest::post(Service::Ssm, "PutParameter", "/").with_body(json!({
                    "Name": name,
                    "Value": value,
                    "Type": "String",
                    "Description": description,
                    "Overwrite": true,
                })),
            )
            .await?;
        Ok(())
    }
}
