//! Find an existing resource by its declared name

use reconciler_clients::ResourceClient;
use reconciler_core::{ManagedResource, ResourceSpec, Result};
use std::sync::Arc;
use tracing::debug;

/// Read-only lookup used on the create path so a re-sent Create adopts the
/// resource an earlier attempt already made.
pub struct IdentityResolver {
    client: Arc<dyn ResourceClient>,
}

impl IdentityResolver {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    /// First resource of the spec's kind whose name equals the declared name.
    pub async fn find(&self, spec: &ResourceSpec) -> Result<Option<ManagedResource>> {
        let existing = self.client.list(spec).await?;
        debug!("{} {}: {} candidate(s) listed", spec.kind, spec.name, existing.len());
        Ok(existing.into_iter().find(|r| r.name == spec.name))
    }
}
