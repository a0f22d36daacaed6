//! Reconciler Clients - control-plane transport and per-kind resource clients

pub mod client;
pub mod http;
pub mod knowledge_base;
pub mod memory;
pub mod parameters;
pub mod role;
pub mod runtime_endpoint;
pub mod transport;

pub use client::{
    DataSource, DataSourceApi, DataSourceSpec, ParameterSink, ResourceClient, Role, RoleApi,
};
pub use http::HttpControlPlane;
pub use knowledge_base::{KnowledgeBaseClient, StorageBackend, ROLE_ARN_LINK};
pub use memory::MemoryClient;
pub use parameters::ParameterStoreClient;
pub use role::RoleClient;
pub use runtime_endpoint::{EndpointRef, RuntimeEndpointClient, RUNTIME_ID_KEY};
pub use transport::{ControlPlane, Method, RpcRequest, Service};
