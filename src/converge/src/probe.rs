/// Collaborator traits consumed by the convergence engine
use crate::error::{MutationError, ProbeError};
use crate::types::{ComponentIdentity, LifecycleState};
use async_trait::async_trait;

/// Read-only queries against the node and the cluster API.
///
/// `Ok(None)` means the query worked but nothing was found; `Err` is a
/// transient failure of the query itself.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Current container id for a logical container name
    async fn container_identity(&self, name: &str) -> Result<Option<String>, ProbeError>;

    /// Lifecycle state of the current container for a logical name
    async fn container_state(&self, name: &str) -> Result<Option<LifecycleState>, ProbeError>;

    /// Identity and state read together.
    ///
    /// Implementations backed by a single query should override this so both
    /// values come from the same instant.
    async fn container_snapshot(&self, name: &str) -> Result<ComponentIdentity, ProbeError> {
        let id = self.container_identity(name).await?;
        let state = self
            .container_state(name)
            .await?
            .unwrap_or(LifecycleState::Unknown);
        Ok(ComponentIdentity::new(name, id, state))
    }

    /// Revision currently applied by an operator-managed component
    async fn current_revision(&self, name: &str) -> Result<Option<u64>, ProbeError>;

    /// Newest revision known for an operator-managed component
    async fn latest_available_revision(&self, name: &str) -> Result<Option<u64>, ProbeError>;
}

/// State-changing request against the cluster API
#[async_trait]
pub trait MutationCommand: Send + Sync {
    /// Force a new configuration revision for `name`.
    ///
    /// Every call uses a fresh change marker; the marker is returned for logging.
    async fn force_new_revision(&self, name: &str) -> Result<String, MutationError>;
}
