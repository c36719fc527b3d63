//! Runs a full recovery plan: restart confirmation for every control-plane
//! container, then forced revision rollout for every operator.
//!
//! Targets run in the configured order. With `parallel` set, the targets of
//! one stage run concurrently, but the operator stage never starts before the
//! container stage has finished. The first fatal error stops the run.
//!
//! Every planned container needs an entry in the baseline captured before the
//! runtime restart; a run with a missing entry fails before anything is polled.

use crate::config::RecoveryConfig;
use crate::error::{ConvergenceError, ProbeError};
use crate::probe::{MutationCommand, StatusProbe};
use crate::progress::ProgressReporter;
use crate::reconciler::RevisionReconciler;
use crate::types::ComponentIdentity;
use crate::watcher::RestartWatcher;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One named target with its timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTarget {
    pub name: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryPlan {
    pub containers: Vec<PlannedTarget>,
    pub operators: Vec<PlannedTarget>,
    pub parallel: bool,
}

impl RecoveryPlan {
    pub fn from_config(config: &RecoveryConfig) -> Self {
        let plan = |targets: &[crate::config::TargetConfig]| {
            targets
                .iter()
                .map(|t| PlannedTarget {
                    name: t.name.clone(),
                    timeout: config.timeout_for(t),
                })
                .collect()
        };
        Self {
            containers: plan(&config.containers),
            operators: plan(&config.operators),
            parallel: config.parallel,
        }
    }
}

/// Container identities captured before the runtime restart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub captured_at: String,
    pub identities: BTreeMap<String, ComponentIdentity>,
}

impl Baseline {
    /// Prior container id for `name`.
    ///
    /// `None` when `name` was never captured; `Some("")` when it was captured
    /// while no container existed for it.
    pub fn prior_for(&self, name: &str) -> Option<&str> {
        self.identities
            .get(name)
            .map(|identity| identity.instance_id_or_empty())
    }

    /// Targets of `plan` the baseline has no entry for
    pub fn missing_for<'a>(&self, plan: &'a RecoveryPlan) -> Vec<&'a str> {
        plan.containers
            .iter()
            .map(|t| t.name.as_str())
            .filter(|name| !self.identities.contains_key(*name))
            .collect()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Restart,
    Revision,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub stage: Stage,
    pub name: String,
    pub converged: bool,
    pub elapsed_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_revision: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub targets: Vec<TargetReport>,
}

impl RecoveryReport {
    pub fn all_converged(&self) -> bool {
        self.targets.iter().all(|t| t.converged)
    }
}

/// A run stopped on a fatal error; carries what completed before it
#[derive(Debug, thiserror::Error)]
#[error("recovery stopped at {target}: {source}")]
pub struct RecoveryError {
    pub target: String,
    #[source]
    pub source: ConvergenceError,
    pub report: RecoveryReport,
}

pub struct RecoveryRunner {
    watcher: RestartWatcher,
    reconciler: RevisionReconciler,
}

impl RecoveryRunner {
    pub fn new(
        probe: Arc<dyn StatusProbe>,
        mutation: Arc<dyn MutationCommand>,
        progress: Arc<dyn ProgressReporter>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            watcher: RestartWatcher::new(probe.clone(), progress.clone(), poll_interval),
            reconciler: RevisionReconciler::new(probe, mutation, progress, poll_interval),
        }
    }

    pub fn watcher(&self) -> &RestartWatcher {
        &self.watcher
    }

    pub fn reconciler(&self) -> &RevisionReconciler {
        &self.reconciler
    }

    /// Record the current identity of every planned container
    pub async fn capture_baseline(&self, plan: &RecoveryPlan) -> Result<Baseline, ProbeError> {
        let mut identities = BTreeMap::new();
        for target in &plan.containers {
            let identity = self.watcher.capture_identity(&target.name).await?;
            identities.insert(target.name.clone(), identity);
        }
        Ok(Baseline {
            captured_at: chrono::Utc::now().to_rfc3339(),
            identities,
        })
    }

    pub async fn run(
        &self,
        plan: &RecoveryPlan,
        baseline: &Baseline,
    ) -> Result<RecoveryReport, RecoveryError> {
        tracing::info!(
            "[RecoveryRunner] Starting: {} containers, {} operators ({})",
            plan.containers.len(),
            plan.operators.len(),
            if plan.parallel { "parallel" } else { "sequential" }
        );
        let mut report = RecoveryReport::default();

        if let Some(name) = baseline.missing_for(plan).first() {
            let source = ConvergenceError::MissingBaseline {
                name: name.to_string(),
            };
            tracing::error!("[RecoveryRunner] Refusing to start: {}", source);
            return Err(RecoveryError {
                target: name.to_string(),
                source,
                report,
            });
        }

        let restarts = self
            .run_stage(plan.parallel, &plan.containers, |target| {
                self.watch_one(target, baseline)
            })
            .await;
        absorb(&mut report, restarts)?;

        let revisions = self
            .run_stage(plan.parallel, &plan.operators, |target| {
                self.reconcile_one(target)
            })
            .await;
        absorb(&mut report, revisions)?;

        tracing::info!(
            "[RecoveryRunner] All {} targets converged",
            report.targets.len()
        );
        Ok(report)
    }

    async fn run_stage<'a, F, Fut>(
        &self,
        parallel: bool,
        targets: &'a [PlannedTarget],
        run_one: F,
    ) -> Vec<(TargetReport, Result<(), ConvergenceError>)>
    where
        F: Fn(&'a PlannedTarget) -> Fut,
        Fut: std::future::Future<Output = (TargetReport, Result<(), ConvergenceError>)>,
    {
        if parallel {
            return join_all(targets.iter().map(run_one)).await;
        }

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let result = run_one(target).await;
            let failed = result.1.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    async fn watch_one(
        &self,
        target: &PlannedTarget,
        baseline: &Baseline,
    ) -> (TargetReport, Result<(), ConvergenceError>) {
        let start = Instant::now();
        let result = match baseline.prior_for(&target.name) {
            Some(prior) => {
                if prior.is_empty() {
                    tracing::warn!(
                        "[RecoveryRunner] Baseline recorded no container for {}, any running instance counts as restarted",
                        target.name
                    );
                }
                self.watcher
                    .wait_for_restart(&target.name, prior, target.timeout)
                    .await
            }
            None => Err(ConvergenceError::MissingBaseline {
                name: target.name.clone(),
            }),
        };

        let mut entry = TargetReport {
            stage: Stage::Restart,
            name: target.name.clone(),
            converged: result.is_ok(),
            elapsed_secs: start.elapsed().as_secs(),
            instance_id: None,
            applied_revision: None,
            error: None,
        };
        match result {
            Ok(identity) => {
                entry.instance_id = identity.instance_id;
                (entry, Ok(()))
            }
            Err(e) => {
                entry.error = Some(e.to_string());
                (entry, Err(e))
            }
        }
    }

    async fn reconcile_one(
        &self,
        target: &PlannedTarget,
    ) -> (TargetReport, Result<(), ConvergenceError>) {
        let start = Instant::now();
        let result = self
            .reconciler
            .trigger_and_confirm(&target.name, target.timeout)
            .await;

        let mut entry = TargetReport {
            stage: Stage::Revision,
            name: target.name.clone(),
            converged: result.is_ok(),
            elapsed_secs: start.elapsed().as_secs(),
            instance_id: None,
            applied_revision: None,
            error: None,
        };
        match result {
            Ok(revision) => {
                entry.applied_revision = Some(revision);
                (entry, Ok(()))
            }
            Err(e) => {
                entry.error = Some(e.to_string());
                (entry, Err(e))
            }
        }
    }
}

/// Append stage results to the report; the first failure in target order
/// becomes the run's error.
fn absorb(
    report: &mut RecoveryReport,
    results: Vec<(TargetReport, Result<(), ConvergenceError>)>,
) -> Result<(), RecoveryError> {
    let mut first_error = None;
    for (entry, result) in results {
        if let Err(e) = result {
            if first_error.is_none() {
                first_error = Some((entry.name.clone(), e));
            }
        }
        report.targets.push(entry);
    }

    match first_error {
        Some((target, source)) => {
            tracing::error!("[RecoveryRunner] Stopping at {}: {}", target, source);
            Err(RecoveryError {
                target,
                source,
                report: std::mem::take(report),
            })
        }
        None => Ok(()),
    }
}
