/// Container status via `crictl`
///
/// Reads `crictl ps -a --name ^<name>$ -o json` and picks the most recently
/// created container whose metadata name matches exactly.
use super::exec::CommandRunner;
use crate::error::ProbeError;
use crate::types::{ComponentIdentity, LifecycleState};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ContainerList {
    #[serde(default)]
    containers: Vec<CriContainer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CriContainer {
    id: String,
    #[serde(default)]
    metadata: Option<CriMetadata>,
    #[serde(default)]
    state: String,
    /// Nanoseconds since epoch; crictl prints int64 fields as strings
    #[serde(default)]
    created_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CriMetadata {
    #[serde(default)]
    name: String,
}

impl CriContainer {
    fn created_nanos(&self) -> i128 {
        match &self.created_at {
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
            Some(serde_json::Value::Number(n)) => n.as_i64().map(i128::from).unwrap_or(0),
            _ => 0,
        }
    }

    fn name(&self) -> &str {
        self.metadata.as_ref().map(|m| m.name.as_str()).unwrap_or("")
    }
}

/// Parse `crictl ps -o json` output into the identity of `name`.
///
/// No matching container yields an identity without an instance id.
pub fn parse_container_list(name: &str, json: &str) -> Result<ComponentIdentity, ProbeError> {
    let list: ContainerList = serde_json::from_str(json)
        .map_err(|e| ProbeError::Parse(format!("crictl ps output: {}", e)))?;

    let newest = list
        .containers
        .into_iter()
        .filter(|c| c.name() == name)
        .max_by_key(|c| (c.created_nanos(), c.state == "CONTAINER_RUNNING"));

    Ok(match newest {
        Some(container) => ComponentIdentity::new(
            name,
            Some(container.id),
            LifecycleState::from_cri(&container.state),
        ),
        None => ComponentIdentity::absent(name),
    })
}

pub struct Crictl {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl Crictl {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    /// Identity and state of the newest container named `name`
    pub async fn snapshot(&self, name: &str) -> Result<ComponentIdentity, ProbeError> {
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "--name".to_string(),
            format!("^{}$", name),
            "-o".to_string(),
            "json".to_string(),
        ];
        let result = self
            .runner
            .run(&self.binary, &args)
            .await
            .map_err(|e| ProbeError::Command(e.to_string()))?;

        if !result.success() {
            return Err(ProbeError::Command(format!(
                "{} ps exited {}: {}",
                self.binary,
                result.exit_code,
                result.last_error_line()
            )));
        }

        let identity = parse_container_list(name, &result.stdout)?;
        tracing::debug!(
            "[Crictl] {}: id={:?} state={}",
            name,
            identity.instance_id,
            identity.state
        );
        Ok(identity)
    }
}
