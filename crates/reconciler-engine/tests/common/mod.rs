//! Scripted in-memory stand-ins for the remote services.
//!
//! Every fake appends to a shared call log so tests can assert ordering
//! across the knowledge base, its data sources, and its role.

#![allow(dead_code)]

use reconciler_clients::{
    DataSource, DataSourceApi, DataSourceSpec, ParameterSink, ResourceClient, Role, RoleApi,
    ROLE_ARN_LINK,
};
use reconciler_core::{
    Error, ManagedResource, Properties, ResourceKind, ResourceSpec, Result, StatusCode,
};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn count(log: &CallLog, prefix: &str) -> usize {
    calls(log).iter().filter(|c| c.starts_with(prefix)).count()
}

pub fn position(log: &CallLog, call: &str) -> usize {
    calls(log)
        .iter()
        .position(|c| c == call)
        .unwrap_or_else(|| panic!("{call} not in {:?}", calls(log)))
}

pub fn props(value: Value) -> Properties {
    value.as_object().cloned().unwrap()
}

pub fn not_found(what: &str) -> Error {
    Error::api(404, Some("ResourceNotFoundException".into()), format!("{what} not found"))
}

// ===========================================================================
// ResourceClient
// ===========================================================================

#[derive(Default)]
struct FakeState {
    /// What `list` returns and `get` falls back to.
    remote: Vec<ManagedResource>,
    /// Responses `get` hands out before consulting `remote`.
    scripted_gets: VecDeque<Result<ManagedResource>>,
    /// Status a freshly created resource starts in.
    created_status: Option<String>,
    next_id: usize,
    last_spec: Option<ResourceSpec>,
}

pub struct FakeClient {
    kind: ResourceKind,
    id_prefix: &'static str,
    state: Mutex<FakeState>,
    pub log: CallLog,
}

impl FakeClient {
    pub fn new(kind: ResourceKind, id_prefix: &'static str, log: CallLog) -> Self {
        Self {
            kind,
            id_prefix,
            state: Mutex::new(FakeState::default()),
            log,
        }
    }

    pub fn memory(log: CallLog) -> Self {
        Self::new(ResourceKind::Memory, "m", log)
    }

    pub fn with_existing(self, resource: ManagedResource) -> Self {
        self.state.lock().unwrap().remote.push(resource);
        self
    }

    pub fn created_status(self, status: &str) -> Self {
        self.state.lock().unwrap().created_status = Some(status.into());
        self
    }

    pub fn script_get(&self, response: Result<ManagedResource>) {
        self.state.lock().unwrap().scripted_gets.push_back(response);
    }

    pub fn script_statuses(&self, id: &str, name: &str, statuses: &[&str]) {
        for status in statuses {
            self.script_get(Ok(ManagedResource::new(id, name, *status)));
        }
    }

    pub fn last_spec(&self) -> Option<ResourceSpec> {
        self.state.lock().unwrap().last_spec.clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ResourceClient for FakeClient {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn list(&self, _spec: &ResourceSpec) -> Result<Vec<ManagedResource>> {
        self.record("list".into());
        Ok(self.state.lock().unwrap().remote.clone())
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<String> {
        self.record(format!("create:{}", spec.name));
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("{}-{}", self.id_prefix, state.next_id);
        let status = state
            .created_status
            .clone()
            .unwrap_or_else(|| StatusCode::ACTIVE.to_string());
        let mut resource = ManagedResource::new(id.clone(), spec.name.clone(), status)
            .with_arn(format!("arn:{}:{}", self.kind, id));
        if let Some(role_arn) = spec.link(ROLE_ARN_LINK) {
            resource.extra.insert(ROLE_ARN_LINK.into(), role_arn.to_string());
        }
        state.remote.push(resource);
        state.last_spec = Some(spec.clone());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<ManagedResource> {
        self.record(format!("get:{id}"));
        let mut state = self.state.lock().unwrap();
        if let Some(scripted) = state.scripted_gets.pop_front() {
            return scripted;
        }
        state
            .remote
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.record(format!("delete:{id}"));
        let mut state = self.state.lock().unwrap();
        let before = state.remote.len();
        state.remote.retain(|r| r.id != id);
        if state.remote.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

// ===========================================================================
// DataSourceApi
// ===========================================================================

pub struct FakeDataSources {
    sources: Mutex<Vec<DataSource>>,
    /// Ids whose delete reports not-found.
    vanished: Mutex<HashSet<String>>,
    pub log: CallLog,
}

impl FakeDataSources {
    pub fn new(log: CallLog) -> Self {
        Self {
            sources: Mutex::new(Vec::new()),
            vanished: Mutex::new(HashSet::new()),
            log,
        }
    }

    pub fn with_source(self, id: &str, name: &str) -> Self {
        self.sources.lock().unwrap().push(DataSource {
            id: id.into(),
            name: name.into(),
            status: StatusCode::new("AVAILABLE"),
        });
        self
    }

    pub fn vanish(self, id: &str) -> Self {
        self.vanished.lock().unwrap().insert(id.into());
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.lock().unwrap().iter().map(|d| d.name.clone()).collect()
    }
}

#[async_trait::async_trait]
impl DataSourceApi for FakeDataSources {
    async fn list_data_sources(&self, knowledge_base_id: &str) -> Result<Vec<DataSource>> {
        self.log.lock().unwrap().push(format!("list_data_sources:{knowledge_base_id}"));
        Ok(self.sources.lock().unwrap().clone())
    }

    async fn create_data_source(&self, knowledge_base_id: &str, spec: &DataSourceSpec) -> Result<String> {
        self.log
            .lock()
            .unwrap()
            .push(format!("create_data_source:{knowledge_base_id}:{}", spec.name));
        let mut sources = self.sources.lock().unwrap();
        let id = format!("ds-{}", sources.len() + 1);
        sources.push(DataSource {
            id: id.clone(),
            name: spec.name.clone(),
            status: StatusCode::new("AVAILABLE"),
        });
        Ok(id)
    }

    async fn delete_data_source(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("delete_data_source:{data_source_id}"));
        let _ = knowledge_base_id;
        if self.vanished.lock().unwrap().contains(data_source_id) {
            return Err(not_found(data_source_id));
        }
        self.sources.lock().unwrap().retain(|d| d.id != data_source_id);
        Ok(())
    }
}

// ===========================================================================
// RoleApi
// ===========================================================================

pub struct FakeRoles {
    role: Mutex<Option<Role>>,
    policies: Mutex<Vec<String>>,
    /// Policies listed on the role but already deleted remotely.
    stale_policies: Mutex<HashSet<String>>,
    pub log: CallLog,
}

impl FakeRoles {
    pub fn new(log: CallLog) -> Self {
        Self {
            role: Mutex::new(None),
            policies: Mutex::new(Vec::new()),
            stale_policies: Mutex::new(HashSet::new()),
            log,
        }
    }

    pub fn with_role(self, name: &str, policies: &[&str]) -> Self {
        *self.role.lock().unwrap() = Some(Role {
            name: name.into(),
            arn: format!("arn:aws:iam::123456789012:role/{name}"),
        });
        *self.policies.lock().unwrap() = policies.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn stale_policy(self, name: &str) -> Self {
        self.stale_policies.lock().unwrap().insert(name.into());
        self
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }

    fn no_such_entity(what: &str) -> Error {
        Error::api(404, Some("NoSuchEntity".into()), format!("{what} cannot be found"))
    }
}

#[async_trait::async_trait]
impl RoleApi for FakeRoles {
    async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        self.record(format!("get_role:{name}"));
        Ok(self.role.lock().unwrap().clone())
    }

    async fn create_role(&self, name: &str, trust_policy: &Value, _description: &str) -> Result<Role> {
        self.record(format!("create_role:{name}"));
        assert_eq!(
            trust_policy["Statement"][0]["Principal"]["Service"],
            json!("bedrock.amazonaws.com")
        );
        let role = Role {
            name: name.into(),
            arn: format!("arn:aws:iam::123456789012:role/{name}"),
        };
        *self.role.lock().unwrap() = Some(role.clone());
        Ok(role)
    }

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, _document: &Value) -> Result<()> {
        self.record(format!("put_role_policy:{role_name}:{policy_name}"));
        self.policies.lock().unwrap().push(policy_name.into());
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> Result<Vec<String>> {
        self.record(format!("list_role_policies:{role_name}"));
        if self.role.lock().unwrap().is_none() {
            return Err(Self::no_such_entity(role_name));
        }
        Ok(self.policies.lock().unwrap().clone())
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> Result<()> {
        self.record(format!("delete_role_policy:{policy_name}"));
        if self.stale_policies.lock().unwrap().contains(policy_name) {
            return Err(Self::no_such_entity(policy_name));
        }
        let _ = role_name;
        self.policies.lock().unwrap().retain(|p| p != policy_name);
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.record(format!("delete_role:{name}"));
        match self.role.lock().unwrap().take() {
            Some(_) => Ok(()),
            None => Err(Self::no_such_entity(name)),
        }
    }
}

// ===========================================================================
// ParameterSink
// ===========================================================================

#[derive(Default)]
pub struct FakeSink {
    pub written: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl ParameterSink for FakeSink {
    async fn put_parameter(&self, name: &str, value: &str, _description: &str) -> Result<()> {
        if self.fail {
            return Err(Error::api(400, Some("AccessDeniedException".into()), "denied"));
        }
        self.written
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
        Ok(())
    }
}
