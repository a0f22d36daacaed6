//! Core types for the reconciler

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Declared properties of a custom resource, as delivered in the event.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Property key every kind carries: free-form deployment label.
pub const ENVIRONMENT_KEY: &str = "Environment";
/// Property key every kind carries: digest of the declared configuration.
pub const CONFIG_HASH_KEY: &str = "ConfigHash";
/// Injected by the orchestrating framework; never part of the desired state.
pub const SERVICE_TOKEN_KEY: &str = "ServiceToken";

// ---------------------------------------------------------------------------
// StatusCode
// ---------------------------------------------------------------------------

/// Remote status string. Open-ended: services add their own values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(String);

impl StatusCode {
    pub const ACTIVE: &'static str = "ACTIVE";
    pub const CREATING: &'static str = "CREATING";
    pub const UPDATING: &'static str = "UPDATING";
    pub const DELETING: &'static str = "DELETING";
    pub const FAILED: &'static str = "FAILED";
    pub const CREATE_FAILED: &'static str = "CREATE_FAILED";
    pub const UPDATE_FAILED: &'static str = "UPDATE_FAILED";
    pub const DELETE_FAILED: &'static str = "DELETE_FAILED";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_active(&self) -> bool {
        self.0 == Self::ACTIVE
    }
}

/// Failure statuses shared by the control planes unless a client overrides them.
pub const DEFAULT_FAILURE_STATUSES: &[&str] = &[
    StatusCode::FAILED,
    StatusCode::CREATE_FAILED,
    StatusCode::UPDATE_FAILED,
    StatusCode::DELETE_FAILED,
];

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for StatusCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StatusCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for StatusCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StatusCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// ManagedResource
// ---------------------------------------------------------------------------

/// Read-only snapshot of a remote resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    pub name: String,
    pub status: StatusCode,
    /// Kind-specific attributes (endpoint URL, parent ids, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ManagedResource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<StatusCode>) -> Self {
        Self {
            id: id.into(),
            arn: None,
            name: name.into(),
            status: status.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// PollBudget
// ---------------------------------------------------------------------------

/// How long, and how often, to poll a remote resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    pub timeout_secs: u64,
    pub interval_secs: u64,
}

impl PollBudget {
    pub const fn new(timeout_secs: u64, interval_secs: u64) -> Self {
        Self {
            timeout_secs,
            interval_secs,
        }
    }

    /// Default budget for waiting on creation.
    pub const fn creation() -> Self {
        Self::new(300, 10)
    }

    /// Default budget for waiting on deletion.
    pub const fn deletion() -> Self {
        Self::new(300, 5)
    }

    /// A budget with a zero interval, or an interval past its timeout, gets
    /// one check and then times out.
    pub fn is_valid(&self) -> bool {
        self.interval_secs > 0 && self.timeout_secs >= self.interval_secs
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// ConfigHash
// ---------------------------------------------------------------------------

/// Digest of the declared properties relevant to a resource kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(String);

impl ConfigHash {
    /// SHA-256 over the canonical JSON of the selected keys. Absent keys are skipped,
    /// key order in the input does not matter.
    pub fn compute(properties: &Properties, keys: &[&str]) -> Self {
        let selected: BTreeMap<&str, &serde_json::Value> = keys
            .iter()
            .filter_map(|k| properties.get(*k).map(|v| (*k, v)))
            .collect();
        let canonical = serde_json::to_string(&selected).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Prefer the hash the deployment declared; derive one otherwise.
    pub fn declared_or_computed(properties: &Properties, keys: &[&str]) -> Self {
        match properties.get(CONFIG_HASH_KEY).and_then(|v| v.as_str()) {
            Some(declared) if !declared.is_empty() => Self(declared.to_string()),
            _ => Self::compute(properties, keys),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ResourceKind
// ---------------------------------------------------------------------------

/// The externally-managed resource kinds this reconciler knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Memory,
    KnowledgeBase,
    RuntimeEndpoint,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Memory, Self::KnowledgeBase, Self::RuntimeEndpoint];

    /// Custom resource type string used by the orchestrating framework.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::Memory => "Custom::AgentCoreMemory",
            Self::KnowledgeBase => "Custom::KnowledgeBase",
            Self::RuntimeEndpoint => "Custom::RuntimeEndpoint",
        }
    }

    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.resource_type() == resource_type)
    }

    /// Property carrying the declared (identifying) name.
    pub fn name_key(&self) -> &'static str {
        match self {
            Self::Memory => "MemoryName",
            Self::KnowledgeBase => "KnowledgeBaseName",
            Self::RuntimeEndpoint => "EndpointName",
        }
    }

    /// Attribute under which the resolved id is returned.
    pub fn id_attribute(&self) -> &'static str {
        match self {
            Self::Memory => "MemoryId",
            Self::KnowledgeBase => "KnowledgeBaseId",
            Self::RuntimeEndpoint => "EndpointId",
        }
    }

    pub fn arn_attribute(&self) -> &'static str {
        match self {
            Self::Memory => "MemoryArn",
            Self::KnowledgeBase => "KnowledgeBaseArn",
            Self::RuntimeEndpoint => "EndpointArn",
        }
    }

    /// Declared properties that feed the config hash.
    pub fn hashed_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Memory => &["MemoryName", "Description", "EventExpiryDays", ENVIRONMENT_KEY],
            Self::KnowledgeBase => &[
                "KnowledgeBaseName",
                "Description",
                "EmbeddingModel",
                "StorageType",
                "DocumentsBucket",
                "InclusionPrefix",
                "DataSourceName",
                ENVIRONMENT_KEY,
            ],
            Self::RuntimeEndpoint => &[
                "EndpointName",
                "AgentRuntimeId",
                "Description",
                "TargetVersion",
                ENVIRONMENT_KEY,
            ],
        }
    }

    /// Check a declared name against the control plane's naming rule.
    pub fn validate_name(&self, name: &str) -> Result<()> {
        let ok = match self {
            Self::Memory | Self::RuntimeEndpoint => agentcore_name_pattern().is_match(name),
            Self::KnowledgeBase => knowledge_base_name_pattern().is_match(name),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "invalid {} name {:?}: must match {}",
                self,
                name,
                self.name_rule()
            )))
        }
    }

    fn name_rule(&self) -> &'static str {
        match self {
            Self::Memory | Self::RuntimeEndpoint => AGENTCORE_NAME_RULE,
            Self::KnowledgeBase => KNOWLEDGE_BASE_NAME_RULE,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::KnowledgeBase => write!(f, "knowledge-base"),
            Self::RuntimeEndpoint => write!(f, "runtime-endpoint"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(Self::Memory),
            "knowledge-base" | "knowledge_base" => Ok(Self::KnowledgeBase),
            "runtime-endpoint" | "runtime_endpoint" => Ok(Self::RuntimeEndpoint),
            other => Self::from_resource_type(other)
                .ok_or_else(|| Error::invalid_event(format!("unknown resource kind: {other}"))),
        }
    }
}

const AGENTCORE_NAME_RULE: &str = r"^[A-Za-z][A-Za-z0-9_]{0,47}$";
const KNOWLEDGE_BASE_NAME_RULE: &str = r"^([0-9A-Za-z][_-]?){1,100}$";

fn agentcore_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(AGENTCORE_NAME_RULE).expect("valid name pattern"))
}

fn knowledge_base_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(KNOWLEDGE_BASE_NAME_RULE).expect("valid name pattern"))
}

// ---------------------------------------------------------------------------
// ResourceSpec
// ---------------------------------------------------------------------------

/// Everything a client needs to create one resource.
#[derive(Clone, Debug)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub name: String,
    pub environment: String,
    pub properties: Properties,
    pub config_hash: ConfigHash,
    /// Idempotency token sent with the create call.
    pub client_token: String,
    /// References produced by earlier provisioning steps (e.g. a role ARN).
    pub links: BTreeMap<String, String>,
}

impl ResourceSpec {
    /// Build a spec from declared properties. Validates the name before anything
    /// touches the network.
    pub fn from_properties(
        kind: ResourceKind,
        properties: &Properties,
        client_token: impl Into<String>,
    ) -> Result<Self> {
        let name = declared_name(kind, properties)?;
        kind.validate_name(&name)?;
        let environment = properties
            .get(ENVIRONMENT_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or("development")
            .to_string();
        Ok(Self {
            kind,
            name,
            environment,
            properties: properties.clone(),
            config_hash: ConfigHash::declared_or_computed(properties, kind.hashed_keys()),
            client_token: client_token.into(),
            links: BTreeMap::new(),
        })
    }

    /// String property, if present and non-empty.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Integer property; accepts numbers and numeric strings (templates stringify everything).
    pub fn property_u64(&self, key: &str) -> Option<u64> {
        match self.properties.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.property(key).ok_or_else(|| {
            Error::validation(format!("{} requires property {key}", self.kind))
        })
    }

    pub fn link(&self, key: &str) -> Option<&str> {
        self.links.get(key).map(String::as_str)
    }
}

/// Read the identifying name of `kind` out of a property bag.
pub fn declared_name(kind: ResourceKind, properties: &Properties) -> Result<String> {
    properties
        .get(kind.name_key())
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::validation(format!("missing property {}", kind.name_key())))
}
