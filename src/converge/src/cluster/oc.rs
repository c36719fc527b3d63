/// Operator revision status and forced redeployment via `oc`
use super::exec::CommandRunner;
use super::marker::MarkerSource;
use crate::error::{MutationError, ProbeError};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Revision counters reported in an operator's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatorRevisions {
    /// Lowest `currentRevision` across all node statuses
    pub current: Option<u64>,
    pub latest_available: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OperatorObject {
    #[serde(default)]
    status: Option<OperatorStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatorStatus {
    #[serde(default)]
    latest_available_revision: Option<u64>,
    #[serde(default)]
    node_statuses: Vec<NodeStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeStatus {
    /// Omitted by the API server when zero
    #[serde(default)]
    current_revision: u64,
}

/// Parse `oc get <resource> <object> -o json` output.
///
/// A missing `nodeStatuses` list leaves `current` empty.
pub fn parse_operator_status(json: &str) -> Result<OperatorRevisions, ProbeError> {
    let object: OperatorObject = serde_json::from_str(json)
        .map_err(|e| ProbeError::Parse(format!("operator status: {}", e)))?;

    let Some(status) = object.status else {
        return Ok(OperatorRevisions::default());
    };

    Ok(OperatorRevisions {
        current: status.node_statuses.iter().map(|n| n.current_revision).min(),
        latest_available: status.latest_available_revision,
    })
}

/// Merge patch that forces the operator to render a new revision
pub fn force_redeployment_patch(marker: &str) -> String {
    serde_json::json!({ "spec": { "forceRedeploymentReason": marker } }).to_string()
}

pub struct Oc {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    kubeconfig: Option<PathBuf>,
    object: String,
    markers: MarkerSource,
}

impl Oc {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        binary: impl Into<String>,
        kubeconfig: Option<PathBuf>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            kubeconfig,
            object: object.into(),
            markers: MarkerSource::default(),
        }
    }

    fn base_args(&self) -> Vec<String> {
        match &self.kubeconfig {
            Some(path) => vec!["--kubeconfig".to_string(), path.display().to_string()],
            None => Vec::new(),
        }
    }

    /// Read revision counters of `resource`
    pub async fn revisions(&self, resource: &str) -> Result<OperatorRevisions, ProbeError> {
        let mut args = self.base_args();
        args.extend([
            "get".to_string(),
            resource.to_string(),
            self.object.clone(),
            "-o".to_string(),
            "json".to_string(),
        ]);

        let result = self
            .runner
            .run(&self.binary, &args)
            .await
            .map_err(|e| ProbeError::Command(e.to_string()))?;
        if !result.success() {
            return Err(ProbeError::Command(format!(
                "{} get {} exited {}: {}",
                self.binary,
                resource,
                result.exit_code,
                result.last_error_line()
            )));
        }

        let revisions = parse_operator_status(&result.stdout)?;
        tracing::debug!(
            "[Oc] {}: current={:?} latest={:?}",
            resource,
            revisions.current,
            revisions.latest_available
        );
        Ok(revisions)
    }

    /// Patch `spec.forceRedeploymentReason` with a fresh marker
    pub async fn force_redeployment(&self, resource: &str) -> Result<String, MutationError> {
        let marker = self.markers.next();
        let mut args = self.base_args();
        args.extend([
            "patch".to_string(),
            resource.to_string(),
            self.object.clone(),
            "--type=merge".to_string(),
            "-p".to_string(),
            force_redeployment_patch(&marker),
        ]);

        tracing::info!("[Oc] Forcing redeployment of {} ({})", resource, marker);
        let result = self
            .runner
            .run(&self.binary, &args)
            .await
            .map_err(|e| MutationError::Exec(e.to_string()))?;
        if !result.success() {
            return Err(MutationError::Rejected(format!(
                "{} patch {} exited {}: {}",
                self.binary,
                resource,
                result.exit_code,
                result.last_error_line()
            )));
        }
        Ok(marker)
    }
}
