//! Control-plane RPC capability
//!
//! Every remote call the reconciler makes is one `RpcRequest` handed to a
//! `ControlPlane`. How the call is authenticated and carried is the
//! implementation's business.

use reconciler_core::Result;
use serde_json::Value;

/// Remote services the reconciler talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Service {
    /// Memory stores and runtime endpoints.
    AgentCoreControl,
    /// Knowledge bases and data sources.
    BedrockAgent,
    Iam,
    /// Parameter store used for output publication.
    Ssm,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentCoreControl => "bedrock-agentcore-control",
            Self::BedrockAgent => "bedrock-agent",
            Self::Iam => "iam",
            Self::Ssm => "ssm",
        }
    }

    /// Public endpoint for a region. IAM is global.
    pub fn default_endpoint(&self, region: &str) -> String {
        match self {
            Self::Iam => "https://iam.amazonaws.com".to_string(),
            other => format!("https://{}.{}.amazonaws.com", other.name(), region),
        }
    }

    /// `X-Amz-Target` prefix for services that route by operation header.
    pub fn target_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Ssm => Some("AmazonSSM"),
            Self::Iam => Some("AWSIdentityManagementV20100508"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// One authenticated call against a control plane.
#[derive(Clone, Debug)]
pub struct RpcRequest {
    pub service: Service,
    /// Operation name, used for routing headers and logs.
    pub operation: &'static str,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RpcRequest {
    pub fn new(service: Service, operation: &'static str, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            operation,
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(service: Service, operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(service, operation, Method::Get, path)
    }

    pub fn post(service: Service, operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(service, operation, Method::Post, path)
    }

    pub fn put(service: Service, operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(service, operation, Method::Put, path)
    }

    pub fn delete(service: Service, operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(service, operation, Method::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Opaque authenticated RPC capability.
///
/// Returns the decoded JSON body on success (`Value::Null` for empty bodies)
/// and `Error::Api` carrying the remote status otherwise.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    async fn call(&self, request: RpcRequest) -> Result<Value>;
}
