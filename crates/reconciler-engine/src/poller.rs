//! Bounded status polling
//!
//! Remote providers answer a create or delete with a transitional status.
//! `StatusPoller` re-fetches the resource until it settles, fails, or the
//! budget runs out.

use reconciler_clients::ResourceClient;
use reconciler_core::{Error, ManagedResource, PollBudget, Result, StatusCode};
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct StatusPoller {
    failure_statuses: Vec<StatusCode>,
}

impl StatusPoller {
    pub fn new(failure_statuses: &[&str]) -> Self {
        Self {
            failure_statuses: failure_statuses.iter().map(|s| StatusCode::new(*s)).collect(),
        }
    }

    /// Poller using the client's own failure set.
    pub fn for_client(client: &dyn ResourceClient) -> Self {
        Self::new(client.failure_statuses())
    }

    pub fn is_failure(&self, status: &StatusCode) -> bool {
        self.failure_statuses.contains(status)
    }

    /// Fetch `id` until its status equals `target`.
    ///
    /// Fails with `TerminalStatus` on the first failure status and with
    /// `Timeout` once the budget is spent. Fetch errors propagate as-is.
    pub async fn wait_for_status<F, Fut>(
        &self,
        id: &str,
        target: &str,
        mut fetch: F,
        budget: PollBudget,
    ) -> Result<ManagedResource>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<ManagedResource>>,
    {
        let started = Instant::now();
        let mut polls = 0u32;
        loop {
            let resource = fetch(id.to_string()).await?;
            polls += 1;
            if resource.status == target {
                info!("{} reached {} after {} poll(s)", id, target, polls);
                return Ok(resource);
            }
            if self.is_failure(&resource.status) {
                return Err(Error::terminal_status(id, resource.status.as_str()));
            }
            debug!("{} is {} (waiting for {}, poll {})", id, resource.status, target, polls);
            self.pause(id, target, started, budget).await?;
        }
    }

    /// Fetch `id` until the provider reports it as not found.
    pub async fn wait_for_deletion<F, Fut>(
        &self,
        id: &str,
        mut fetch: F,
        budget: PollBudget,
    ) -> Result<()>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<ManagedResource>>,
    {
        let started = Instant::now();
        loop {
            match fetch(id.to_string()).await {
                Err(e) if e.is_not_found() => {
                    info!("{} deleted", id);
                    return Ok(());
                }
                Err(e) => return Err(e),
                Ok(resource) if self.is_failure(&resource.status) => {
                    return Err(Error::terminal_status(id, resource.status.as_str()));
                }
                Ok(resource) => debug!("{} still present ({})", id, resource.status),
            }
            self.pause(id, "deletion", started, budget).await?;
        }
    }

    /// Sleep one interval, or fail if that would leave the budget.
    async fn pause(&self, id: &str, target: &str, started: Instant, budget: PollBudget) -> Result<()> {
        if !budget.is_valid() {
            return Err(Error::timeout(id, target, started.elapsed().as_secs()));
        }
        tokio::time::sleep(budget.interval()).await;
        let elapsed = started.elapsed();
        if elapsed >= budget.timeout() {
            return Err(Error::timeout(id, target, elapsed.as_secs()));
        }
        Ok(())
    }
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new(reconciler_core::DEFAULT_FAILURE_STATUSES)
    }
}
