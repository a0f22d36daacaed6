//! Resource client traits
//!
//! `ResourceClient` is the capability every resource kind exposes to the
//! reconciler. The knowledge base bundle additionally needs data sources
//! (`DataSourceApi`) and an IAM role (`RoleApi`).

use crate::transport::{ControlPlane, RpcRequest};
use reconciler_core::{
    Error, ManagedResource, ResourceKind, ResourceSpec, Result, StatusCode,
    DEFAULT_FAILURE_STATUSES,
};
use serde_json::{json, Value};

/// Upper bound on pages followed by one list call.
pub(crate) const MAX_PAGES: usize = 1000;

/// list / create / get / delete against one kind's control API.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// All resources in the scope the spec addresses (for most kinds: the account).
    async fn list(&self, spec: &ResourceSpec) -> Result<Vec<ManagedResource>>;

    /// Start creation. Returns the new resource's id; the resource is usually
    /// still transitioning.
    async fn create(&self, spec: &ResourceSpec) -> Result<String>;

    /// Current remote state. Not-found errors must classify as such.
    async fn get(&self, id: &str) -> Result<ManagedResource>;

    /// Start deletion.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Statuses after which polling cannot succeed.
    fn failure_statuses(&self) -> &[&'static str] {
        DEFAULT_FAILURE_STATUSES
    }

    fn is_terminal_failure(&self, status: &StatusCode) -> bool {
        self.failure_statuses().contains(&status.as_str())
    }
}

/// A data source attached to a knowledge base.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub status: StatusCode,
}

/// Data-source children of a knowledge base.
#[async_trait::async_trait]
pub trait DataSourceApi: Send + Sync {
    async fn list_data_sources(&self, knowledge_base_id: &str) -> Result<Vec<DataSource>>;

    /// Returns the new data source id.
    async fn create_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String>;

    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()>;
}

/// What a data source reads from.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSourceSpec {
    pub name: String,
    pub description: String,
    pub bucket_arn: String,
    pub inclusion_prefixes: Vec<String>,
    pub client_token: String,
}

/// An IAM role as far as the reconciler cares.
#[derive(Clone, Debug, PartialEq)]
pub struct Role {
    pub name: String,
    pub arn: String,
}

/// Role and inline-policy management.
#[async_trait::async_trait]
pub trait RoleApi: Send + Sync {
    /// `None` when no role with that name exists.
    async fn get_role(&self, name: &str) -> Result<Option<Role>>;

    async fn create_role(&self, name: &str, trust_policy: &Value, description: &str) -> Result<Role>;

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, document: &Value) -> Result<()>;

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>>;

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()>;

    async fn delete_role(&self, name: &str) -> Result<()>;
}

/// Write-only key/value store for publishing outputs.
#[async_trait::async_trait]
pub trait ParameterSink: Send + Sync {
    async fn put_parameter(&self, name: &str, value: &str, description: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// First present string among `keys`.
pub(crate) fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

pub(crate) fn required_str(value: &Value, keys: &[&str], context: &str) -> Result<String> {
    str_field(value, keys).ok_or_else(|| {
        Error::InvalidResponse(format!("{context}: missing {}", keys.join("/")))
    })
}

/// The object under `key`, or the value itself when the service returns it flat.
pub(crate) fn unwrap_object<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).filter(|v| v.is_object()).unwrap_or(value)
}

/// Follow `nextToken` pagination and collect the items under `items_key`.
pub(crate) async fn list_all(
    rpc: &dyn ControlPlane,
    request: RpcRequest,
    items_key: &str,
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut next_token: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let mut body = request.body.clone().unwrap_or_else(|| json!({}));
        if let Some(token) = &next_token {
            body["nextToken"] = json!(token);
        }
        let page = rpc.call(request.clone().with_body(body)).await?;

        if let Some(page_items) = page.get(items_key).and_then(Value::as_array) {
            items.extend(page_items.iter().cloned());
        }
        match page.get("nextToken").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => return Ok(items),
        }
    }

    Err(Error::InvalidResponse(format!(
        "{} {}: more than {MAX_PAGES} pages",
        request.service, request.operation
    )))
}
