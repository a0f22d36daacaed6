//! Lifecycle event protocol: custom-resource style JSON
//!
//! Wire format:
//!
//! Framework → Reconciler (event):
//!   { "RequestType": "Create", "ResourceType": "Custom::AgentCoreMemory",
//!     "ResourceProperties": { "MemoryName": "testMemory", "Environment": "dev" },
//!     "OldResourceProperties": { ... },      (Update only)
//!     "PhysicalResourceId": "m-1" }          (Update/Delete)
//!
//! Reconciler → Framework (response):
//!   { "Status": "SUCCESS", "PhysicalResourceId": "m-1", "Data": { "MemoryId": "m-1" } }
//!   { "Status": "FAILED", "PhysicalResourceId": "testMemory", "Reason": "..." }
//!
//! Optional bookkeeping fields (`RequestId`, `StackId`, `LogicalResourceId`,
//! `ResponseURL`) are carried through untouched.

use crate::types::Properties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Framework → Reconciler
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "Create"),
            Self::Update => write!(f, "Update"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// One lifecycle event for one logical resource.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Properties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_resource_id: Option<String>,
    #[serde(
        rename = "ResponseURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_url: Option<String>,
}

impl LifecycleEvent {
    pub fn new(request_type: RequestType, resource_properties: Properties) -> Self {
        Self {
            request_type,
            resource_type: None,
            resource_properties,
            old_resource_properties: None,
            physical_resource_id: None,
            request_id: None,
            stack_id: None,
            logical_resource_id: None,
            response_url: None,
        }
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_physical_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(id.into());
        self
    }

    pub fn with_old_properties(mut self, properties: Properties) -> Self {
        self.old_resource_properties = Some(properties);
        self
    }

    /// Declared string property.
    pub fn declared(&self, key: &str) -> Option<&str> {
        self.resource_properties.get(key).and_then(|v| v.as_str())
    }

    /// Prior string property (Update only).
    pub fn prior(&self, key: &str) -> Option<&str> {
        self.old_resource_properties
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
    }

    /// Prior identity, ignoring empty strings some frameworks send on Create.
    pub fn prior_identity(&self) -> Option<&str> {
        self.physical_resource_id
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Reconciler → Framework
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Structured outcome consumed by the orchestrating framework.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleResponse {
    pub status: ResponseStatus,
    pub physical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_resource_id: Option<String>,
}

impl LifecycleResponse {
    pub fn success(physical_resource_id: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            physical_resource_id: physical_resource_id.into(),
            data: Some(data),
            reason: None,
            request_id: None,
            stack_id: None,
            logical_resource_id: None,
        }
    }

    pub fn failed(physical_resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            physical_resource_id: physical_resource_id.into(),
            data: None,
            reason: Some(reason.into()),
            request_id: None,
            stack_id: None,
            logical_resource_id: None,
        }
    }

    /// Echo the event's bookkeeping ids so the framework can correlate.
    pub fn correlate(mut self, event: &LifecycleEvent) -> Self {
        self.request_id = event.request_id.clone();
        self.stack_id = event.stack_id.clone();
        self.logical_resource_id = event.logical_resource_id.clone();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Attribute lookup, as downstream definitions do with `Fn::GetAtt`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key).map(String::as_str)
    }
}
