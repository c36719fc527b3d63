/// Snapshot types for control-plane components
use serde::{Deserialize, Serialize};

/// Lifecycle state of a runtime entity as reported by the container runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// State could not be determined
    Unknown,
    /// Container is created but not yet running
    Starting,
    /// Container is running
    Running,
    /// Container exited or failed
    Failed,
}

impl LifecycleState {
    /// Map a CRI container state string (`CONTAINER_RUNNING`, ...) to a lifecycle state
    pub fn from_cri(state: &str) -> Self {
        match state {
            "CONTAINER_RUNNING" => LifecycleState::Running,
            "CONTAINER_CREATED" => LifecycleState::Starting,
            "CONTAINER_EXITED" => LifecycleState::Failed,
            _ => LifecycleState::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Unknown => write!(f, "unknown"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Failed => write!(f, "failed"),
        }
    }
}

/// Identity of a named runtime entity at one instant.
///
/// `instance_id` is `None` when nothing could be resolved for `name`
/// (for example the runtime has not started the container yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentity {
    /// Logical name (e.g. "etcd")
    pub name: String,
    /// Opaque current-instance identifier (container id)
    pub instance_id: Option<String>,
    /// Lifecycle state of that instance
    pub state: LifecycleState,
}

impl ComponentIdentity {
    pub fn new(name: impl Into<String>, instance_id: Option<String>, state: LifecycleState) -> Self {
        Self {
            name: name.into(),
            instance_id: instance_id.filter(|id| !id.is_empty()),
            state,
        }
    }

    /// Identity for a name the runtime does not know about
    pub fn absent(name: impl Into<String>) -> Self {
        Self::new(name, None, LifecycleState::Unknown)
    }

    /// True when this snapshot shows a new, running instance compared to `prior`.
    ///
    /// All three conditions must hold in the same snapshot: an identity is
    /// present, it differs from `prior`, and the state is `Running`.
    pub fn is_restarted_from(&self, prior: &str) -> bool {
        match self.instance_id.as_deref() {
            Some(id) => id != prior && self.state.is_running(),
            None => false,
        }
    }

    pub fn instance_id_or_empty(&self) -> &str {
        self.instance_id.as_deref().unwrap_or("")
    }
}

/// Revision counters of an operator-managed component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionState {
    /// Revision actually applied and active
    pub current_revision: u64,
    /// Newest revision known to the system, possibly not yet applied
    pub latest_available_revision: u64,
}

impl RevisionState {
    /// Revision that proves a forced rollout took effect
    pub fn expected_after_trigger(&self) -> u64 {
        self.latest_available_revision.saturating_add(1)
    }
}
