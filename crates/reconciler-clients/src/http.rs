//! HTTP control plane over reqwest
//!
//! Sends each call as JSON to a per-service base URL. Request signing is not
//! done here: point the base URLs at a signing proxy, or supply static headers
//! for endpoints that accept them.
//!
//! IAM only speaks the Query protocol. Its calls go out as `x-amz-json-1.1`
//! with an `AWSIdentityManagementV20100508.*` target, so the IAM base URL must
//! be a proxy that translates them.

use crate::transport::{ControlPlane, Method, RpcRequest, Service};
use reconciler_core::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error};
use url::Url;

pub struct HttpControlPlane {
    client: Client,
    region: String,
    endpoints: HashMap<Service, String>,
    headers: Vec<(String, String)>,
}

impl HttpControlPlane {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            region: region.into(),
            endpoints: HashMap::new(),
            headers: Vec::new(),
        }
    }

    /// Override the base URL for one service.
    pub fn with_endpoint(mut self, service: Service, url: impl Into<String>) -> Self {
        self.endpoints.insert(service, url.into());
        self
    }

    /// Header sent with every call.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn url_for(&self, service: Service, path: &str) -> Result<Url> {
        let mut base = self
            .endpoints
            .get(&service)
            .cloned()
            .unwrap_or_else(|| service.default_endpoint(&self.region));
        // Keep any path prefix on the base (proxies mount services under one).
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| Error::Config(format!("bad endpoint for {service}: {e}")))?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("bad path {path} for {service}: {e}")))
    }
}

#[async_trait::async_trait]
impl ControlPlane for HttpControlPlane {
    async fn call(&self, request: RpcRequest) -> Result<Value> {
        let url = self.url_for(request.service, &request.path)?;
        debug!("{} {} {}", request.service, request.operation, url);

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(prefix) = request.service.target_prefix() {
            builder = builder
                .header("x-amz-target", format!("{}.{}", prefix, request.operation))
                .header("content-type", "application/x-amz-json-1.1");
        }
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{} {}: {e}", request.service, request.operation)))?;

        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = api_error(status.as_u16(), error_type.as_deref(), &text);
            if err.is_not_found() {
                debug!("{} {} -> not found", request.service, request.operation);
            } else {
                error!("{} {} error {}: {}", request.service, request.operation, status, text);
            }
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            Error::InvalidResponse(format!("{} {}: {e}", request.service, request.operation))
        })
    }
}

/// Build an `Error::Api` from a failed response.
///
/// The error code comes from the body (`__type`, `code`, `Code`, or
/// `Error.Code`); the symbolic name from the `x-amzn-ErrorType` header.
pub fn api_error(status: u16, error_type: Option<&str>, body: &str) -> Error {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |keys: &[&str]| -> Option<String> {
        let v = parsed.as_ref()?;
        keys.iter().find_map(|k| {
            v.get(*k)
                .or_else(|| v.get("Error").and_then(|e| e.get(*k)))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    };
    let code = field(&["__type", "code", "Code"]);
    let message = field(&["message", "Message"]).unwrap_or_else(|| body.trim().to_string());
    Error::Api {
        status,
        error_type: error_type.map(str::to_string),
        code,
        message,
    }
}
