//! Error types for convergence operations and their collaborators
use crate::types::LifecycleState;
use thiserror::Error;

/// Fatal outcome of a RestartWatcher or RevisionReconciler operation.
///
/// None of these are retried inside the operation; the surrounding procedure
/// decides whether to abort or re-run a whole attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvergenceError {
    #[error("{name}: baseline revision info unavailable (current={current:?}, latest={latest:?})")]
    InfoUnavailable {
        name: String,
        current: Option<u64>,
        latest: Option<u64>,
    },

    #[error("{name}: forced revision rollout rejected: {reason}")]
    MutationRejected { name: String, reason: String },

    #[error("{name}: revision did not converge, expected >= {expected}, observed {observed:?}")]
    ConvergenceTimeout {
        name: String,
        expected: u64,
        observed: Option<u64>,
    },

    #[error(
        "{name}: container not running after restart (prior id {prior:?}, observed id {observed_id:?}, state {observed_state})"
    )]
    NotRunning {
        name: String,
        prior: String,
        observed_id: Option<String>,
        observed_state: LifecycleState,
    },

    #[error("{name}: no baseline identity recorded before the restart")]
    MissingBaseline { name: String },
}

impl ConvergenceError {
    /// Component name the failure refers to
    pub fn component(&self) -> &str {
        match self {
            ConvergenceError::InfoUnavailable { name, .. }
            | ConvergenceError::MutationRejected { name, .. }
            | ConvergenceError::ConvergenceTimeout { name, .. }
            | ConvergenceError::NotRunning { name, .. }
            | ConvergenceError::MissingBaseline { name } => name,
        }
    }

    /// Whether a higher layer may re-run the whole attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConvergenceError::ConvergenceTimeout { .. })
    }
}

/// Transient failure of a status probe. Absorbed by polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("Probe command failed: {0}")]
    Command(String),

    #[error("Probe output could not be parsed: {0}")]
    Parse(String),
}

/// Failure of the state-changing request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("Mutation rejected: {0}")]
    Rejected(String),

    #[error("Mutation command failed to execute: {0}")]
    Exec(String),
}

/// Failure running an external program
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },
}

/// Configuration loading or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
