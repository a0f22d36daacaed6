//! IAM role client

use crate::client::{required_str, Role, RoleApi, MAX_PAGES};
use crate::transport::{ControlPlane, RpcRequest, Service};
use reconciler_core::{tolerate_not_found, Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct RoleClient {
    rpc: Arc<dyn ControlPlane>,
}

impl RoleClient {
    pub fn new(rpc: Arc<dyn ControlPlane>) -> Self {
        Self { rpc }
    }

    async fn call(&self, operation: &'static str, body: Value) -> Result<Value> {
        self.rpc
            .call(RpcRequest::post(Service::Iam, operation, "/").with_body(body))
            .await
    }

    fn parse_role(value: &Value) -> Result<Role> {
        let role = value.get("Role").unwrap_or(value);
        Ok(Role {
            name: required_str(role, &["RoleName"], "role")?,
            arn: required_str(role, &["Arn"], "role")?,
        })
    }
}

#[async_trait::async_trait]
impl RoleApi for RoleClient {
    async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        let found = tolerate_not_found(self.call("GetRole", json!({ "RoleName": name })).await)?;
        found.as_ref().map(Self::parse_role).transpose()
    }

    async fn create_role(&self, name: &str, trust_policy: &Value, description: &str) -> Result<Role> {
        let response = self
            .call(
                "CreateRole",
                json!({
                    "RoleName": name,
                    "AssumeRolePolicyDocument": trust_policy.to_string(),
                    "Description": description,
                }),
            )
            .await?;
        Self::parse_role(&response)
    }

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, document: &Value) -> Result<()> {
        self.call(
            "PutRolePolicy",
            json!({
                "RoleName": role_name,
                "PolicyName": policy_name,
                "PolicyDocument": document.to_string(),
            }),
        )
        .await?;
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut body = json!({ "RoleName": role_name });
            if let Some(m) = &marker {
                body["Marker"] = json!(m);
            }
            let page = self.call("ListRolePolicies", body).await?;
            if let Some(items) = page.get("PolicyNames").and_then(Value::as_array) {
                names.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            let truncated = page.get("IsTruncated").and_then(Value::as_bool).unwrap_or(false);
            marker = page.get("Marker").and_then(Value::as_str).map(str::to_string);
            if !truncated || marker.is_none() {
                return Ok(names);
            }
        }
        Err(Error::InvalidResponse(format!(
            "ListRolePolicies {role_name}: more than {MAX_PAGES} pages"
        )))
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        self.call(
            "DeleteRolePolicy",
            json!({ "RoleName": role_name, "PolicyName": policy_name }),
        )
        .await?;
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.call("DeleteRole", json!({ "RoleName": name })).await?;
        Ok(())
    }
}
