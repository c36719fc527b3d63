//! Control-plane convergence after a platform rollback
//!
//! Once a node's backed-up state has been restored and its container runtime
//! restarted, this crate confirms that every control-plane container came
//! back as a new running instance and that every operator-managed component
//! rolled out a fresh configuration revision.

pub mod cluster;
pub mod config;
pub mod error;
pub mod poll;
pub mod probe;
pub mod progress;
pub mod reconciler;
pub mod runner;
pub mod types;
pub mod watcher;

pub use cluster::{ClusterProbe, CommandRunner, TokioCommandRunner};
pub use config::{DeploymentProfile, RecoveryConfig, TargetConfig};
pub use error::{ConfigError, ConvergenceError, ExecError, MutationError, ProbeError};
pub use poll::{poll_until, Deadline, PollOutcome, PollResult, DEFAULT_POLL_INTERVAL};
pub use probe::{MutationCommand, StatusProbe};
pub use progress::{LogProgress, ProgressReporter, StderrProgress};
pub use reconciler::{ReconcileAttempt, ReconcilePhase, RevisionReconciler};
pub use runner::{
    Baseline, PlannedTarget, RecoveryError, RecoveryPlan, RecoveryReport, RecoveryRunner,
    Stage, TargetReport,
};
pub use types::{ComponentIdentity, LifecycleState, RevisionState};
pub use watcher::RestartWatcher;
