//! Reconciler Engine - polling, identity resolution, provisioning and dispatch

pub mod config;
pub mod dispatcher;
pub mod knowledge_base;
pub mod outputs;
pub mod poller;
pub mod reconciler;
pub mod resolver;

pub use config::ReconcilerConfig;
pub use dispatcher::{attributes, fallback_identity, Dispatcher, HandlerFactory, ResourceHandler};
pub use knowledge_base::{KnowledgeBaseSettings, KnowledgeBaseSteps, DATA_SOURCE_ID_ATTRIBUTE};
pub use outputs::OutputPublisher;
pub use poller::StatusPoller;
pub use reconciler::{
    changed_properties, NoSteps, ProvisionSteps, Reconciler, UpdatePolicy,
    IGNORED_PROPERTIES_ATTRIBUTE,
};
pub use resolver::IdentityResolver;
