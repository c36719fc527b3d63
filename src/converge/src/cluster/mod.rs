//! Collaborator implementations backed by node and cluster tooling.
//!
//! Container identity comes from the CRI runtime (`crictl`), operator
//! revisions and forced redeployments from the cluster API (`oc`).

pub mod crictl;
pub mod exec;
pub mod marker;
pub mod oc;

pub use crictl::Crictl;
pub use exec::{CommandRunner, ExecResult, TokioCommandRunner};
pub use marker::MarkerSource;
pub use oc::Oc;

use crate::config::RecoveryConfig;
use crate::error::{MutationError, ProbeError};
use crate::probe::{MutationCommand, StatusProbe};
use crate::types::{ComponentIdentity, LifecycleState};
use async_trait::async_trait;
use std::sync::Arc;

/// Status probe and mutation command for one control-plane node
pub struct ClusterProbe {
    crictl: Crictl,
    oc: Oc,
}

impl ClusterProbe {
    pub fn new(crictl: Crictl, oc: Oc) -> Self {
        Self { crictl, oc }
    }

    /// Build from configuration with a shared command runner
    pub fn from_config(config: &RecoveryConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(
            Crictl::new(runner.clone(), config.crictl_path.clone()),
            Oc::new(
                runner,
                config.oc_path.clone(),
                config.kubeconfig.clone(),
                config.operator_object.clone(),
            ),
        )
    }
}

#[async_trait]
impl StatusProbe for ClusterProbe {
    async fn container_identity(&self, name: &str) -> Result<Option<String>, ProbeError> {
        Ok(self.crictl.snapshot(name).await?.instance_id)
    }

    async fn container_state(&self, name: &str) -> Result<Option<LifecycleState>, ProbeError> {
        let identity = self.crictl.snapshot(name).await?;
        Ok(identity.instance_id.map(|_| identity.state))
    }

    async fn container_snapshot(&self, name: &str) -> Result<ComponentIdentity, ProbeError> {
        self.crictl.snapshot(name).await
    }

    async fn current_revision(&self, name: &str) -> Result<Option<u64>, ProbeError> {
        Ok(self.oc.revisions(name).await?.current)
    }

    async fn latest_available_revision(&self, name: &str) -> Result<Option<u64>, ProbeError> {
        Ok(self.oc.revisions(name).await?.latest_available)
    }
}

#[async_trait]
impl MutationCommand for ClusterProbe {
    async fn force_new_revision(&self, name: &str) -> Result<String, MutationError> {
        self.oc.force_redeployment(name).await
    }
}
