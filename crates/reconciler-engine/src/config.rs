//! Reconciler configuration
//!
//! All tunables in one place. Loaded from TOML, every section optional,
//! a missing file means defaults. Region and account can come from the
//! environment the handler runs in.

use crate::knowledge_base::KnowledgeBaseSettings;
use crate::reconciler::UpdatePolicy;
use reconciler_clients::{HttpControlPlane, Service, StorageBackend};
use reconciler_core::{Error, PollBudget, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when neither `--config` nor `RECONCILER_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "reconciler.toml";
pub const CONFIG_PATH_ENV: &str = "RECONCILER_CONFIG";

const SERVICES: [Service; 4] = [
    Service::AgentCoreControl,
    Service::BedrockAgent,
    Service::Iam,
    Service::Ssm,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub poll: PollConfig,
    pub control_plane: ControlPlaneConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub outputs: OutputsConfig,
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub create_timeout_secs: u64,
    pub create_interval_secs: u64,
    pub delete_timeout_secs: u64,
    pub delete_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub region: String,
    /// Needed by the knowledge base role and bucket names.
    pub account_id: String,
    /// Base URL per service name (e.g. `ssm`), typically a signing proxy.
    pub endpoints: BTreeMap<String, String>,
    /// Static headers sent with every call.
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// Pause after creating the service role.
    pub propagation_delay_secs: u64,
    /// Model id or full ARN.
    pub embedding_model: String,
    pub documents_bucket: String,
    pub vectors_bucket: String,
    pub inclusion_prefix: String,
    pub storage: StorageBackend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    pub enabled: bool,
    pub prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Fail updates that change anything besides the name.
    pub reject_in_place_changes: bool,
}

// ============================================================
// Defaults
// ============================================================

impl Default for PollConfig {
    fn default() -> Self {
        let create = PollBudget::creation();
        let delete = PollBudget::deletion();
        Self {
            create_timeout_secs: create.timeout_secs,
            create_interval_secs: create.interval_secs,
            delete_timeout_secs: delete.timeout_secs,
            delete_interval_secs: delete.interval_secs,
        }
    }
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            account_id: String::new(),
            endpoints: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        let settings = KnowledgeBaseSettings::default();
        Self {
            propagation_delay_secs: settings.propagation_delay.as_secs(),
            embedding_model: "amazon.titan-embed-text-v2:0".into(),
            documents_bucket: settings.documents_bucket,
            vectors_bucket: settings.vectors_bucket,
            inclusion_prefix: settings.inclusion_prefix,
            storage: StorageBackend::default(),
        }
    }
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "/agentcore".into(),
        }
    }
}

// ============================================================
// Derived values
// ============================================================

impl PollConfig {
    pub fn create_budget(&self) -> PollBudget {
        PollBudget::new(self.create_timeout_secs, self.create_interval_secs)
    }

    pub fn delete_budget(&self) -> PollBudget {
        PollBudget::new(self.delete_timeout_secs, self.delete_interval_secs)
    }
}

impl KnowledgeBaseConfig {
    pub fn embedding_model_arn(&self, region: &str) -> String {
        if self.embedding_model.starts_with("arn:") {
            self.embedding_model.clone()
        } else {
            format!("arn:aws:bedrock:{region}::foundation-model/{}", self.embedding_model)
        }
    }

    pub fn settings(&self, control_plane: &ControlPlaneConfig) -> KnowledgeBaseSettings {
        KnowledgeBaseSettings {
            region: control_plane.region.clone(),
            account_id: control_plane.account_id.clone(),
            propagation_delay: Duration::from_secs(self.propagation_delay_secs),
            documents_bucket: self.documents_bucket.clone(),
            vectors_bucket: self.vectors_bucket.clone(),
            inclusion_prefix: self.inclusion_prefix.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl UpdateConfig {
    pub fn policy(&self) -> UpdatePolicy {
        if self.reject_in_place_changes {
            UpdatePolicy::Reject
        } else {
            UpdatePolicy::Report
        }
    }
}

impl ControlPlaneConfig {
    /// HTTP transport with the configured endpoint overrides and headers.
    pub fn http_control_plane(&self) -> Result<HttpControlPlane> {
        let mut transport = HttpControlPlane::new(self.region.clone());
        for (name, url) in &self.endpoints {
            let service = SERVICES
                .into_iter()
                .find(|s| s.name() == name.as_str())
                .ok_or_else(|| Error::Config(format!("unknown service in endpoints: {name}")))?;
            transport = transport.with_endpoint(service, url.clone());
        }
        for (name, value) in &self.headers {
            transport = transport.with_header(name.clone(), value.clone());
        }
        Ok(transport)
    }
}

// ============================================================
// Loading
// ============================================================

impl ReconcilerConfig {
    /// Config file to read: explicit path, then `RECONCILER_CONFIG`, then the default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load from a TOML file. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Apply `AWS_REGION` / `AWS_DEFAULT_REGION` and `AWS_ACCOUNT_ID`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(region) = non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")) {
            self.control_plane.region = region;
        }
        if let Some(account) = non_empty("AWS_ACCOUNT_ID") {
            self.control_plane.account_id = account;
        }
        self
    }

    /// Serialize as TOML (for generating a starter config file).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
