//! RevisionReconciler: forces an operator-managed component to roll out a new
//! configuration revision and waits until the applied revision catches up.
//!
//! Convergence means `current_revision >= latest_available_revision + 1`
//! where `latest_available_revision` is read before the trigger. Revision
//! counters only move forward and other controllers may bump them too, so a
//! value past the target is success.

use crate::error::{ConvergenceError, ProbeError};
use crate::poll::{poll_until, Deadline, PollOutcome, PollResult};
use crate::probe::{MutationCommand, StatusProbe};
use crate::progress::ProgressReporter;
use crate::types::RevisionState;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Phase of one reconciliation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Idle,
    BaselineRead,
    Mutating,
    Polling,
    Converged,
    TimedOut,
    Failed,
}

impl ReconcilePhase {
    pub fn can_transition_to(self, next: ReconcilePhase) -> bool {
        use ReconcilePhase::*;
        matches!(
            (self, next),
            (Idle, BaselineRead)
                | (BaselineRead, Mutating)
                | (BaselineRead, Failed)
                | (Mutating, Polling)
                | (Mutating, Failed)
                | (Polling, Converged)
                | (Polling, TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReconcilePhase::Converged | ReconcilePhase::TimedOut | ReconcilePhase::Failed
        )
    }
}

/// Record of a single reconciliation attempt for one component
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileAttempt {
    pub name: String,
    history: Vec<ReconcilePhase>,
    pub baseline: Option<RevisionState>,
    pub expected_revision: Option<u64>,
    pub marker: Option<String>,
}

impl ReconcileAttempt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: vec![ReconcilePhase::Idle],
            baseline: None,
            expected_revision: None,
            marker: None,
        }
    }

    pub fn phase(&self) -> ReconcilePhase {
        self.history
            .last()
            .copied()
            .unwrap_or(ReconcilePhase::Idle)
    }

    /// Every phase entered so far, starting with `Idle`
    pub fn history(&self) -> &[ReconcilePhase] {
        &self.history
    }

    /// Move to `next`. Returns false and leaves the phase unchanged when the
    /// transition is not allowed.
    pub fn advance(&mut self, next: ReconcilePhase) -> bool {
        let current = self.phase();
        if !current.can_transition_to(next) {
            tracing::error!(
                "[RevisionReconciler] {}: illegal phase transition {:?} -> {:?}",
                self.name,
                current,
                next
            );
            return false;
        }
        tracing::debug!(
            "[RevisionReconciler] {}: {:?} -> {:?}",
            self.name,
            current,
            next
        );
        self.history.push(next);
        true
    }
}

pub struct RevisionReconciler {
    probe: Arc<dyn StatusProbe>,
    mutation: Arc<dyn MutationCommand>,
    progress: Arc<dyn ProgressReporter>,
    poll_interval: Duration,
}

impl RevisionReconciler {
    pub fn new(
        probe: Arc<dyn StatusProbe>,
        mutation: Arc<dyn MutationCommand>,
        progress: Arc<dyn ProgressReporter>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            probe,
            mutation,
            progress,
            poll_interval,
        }
    }

    /// Trigger a new revision for `name` and wait until it is applied.
    ///
    /// Returns the applied revision, which is at least the latest available
    /// revision seen before the trigger plus one.
    pub async fn trigger_and_confirm(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<u64, ConvergenceError> {
        self.attempt(name, timeout).await.1
    }

    /// Same as [`trigger_and_confirm`](Self::trigger_and_confirm) but also
    /// returns the attempt record with its phase history.
    pub async fn attempt(
        &self,
        name: &str,
        timeout: Duration,
    ) -> (ReconcileAttempt, Result<u64, ConvergenceError>) {
        let mut attempt = ReconcileAttempt::new(name);
        let result = self.run(&mut attempt, name, timeout).await;
        (attempt, result)
    }

    async fn run(
        &self,
        attempt: &mut ReconcileAttempt,
        name: &str,
        timeout: Duration,
    ) -> Result<u64, ConvergenceError> {
        let deadline = Deadline::after(timeout);

        attempt.advance(ReconcilePhase::BaselineRead);
        let baseline = match self.read_baseline(name).await {
            Ok(baseline) => baseline,
            Err(err) => {
                attempt.advance(ReconcilePhase::Failed);
                tracing::error!("[RevisionReconciler] {}", err);
                return Err(err);
            }
        };
        let expected = baseline.expected_after_trigger();
        attempt.baseline = Some(baseline);
        attempt.expected_revision = Some(expected);
        tracing::info!(
            "[RevisionReconciler] {}: current revision {}, latest available {}, expecting >= {}",
            name,
            baseline.current_revision,
            baseline.latest_available_revision,
            expected
        );

        attempt.advance(ReconcilePhase::Mutating);
        match self.mutation.force_new_revision(name).await {
            Ok(marker) => {
                tracing::info!(
                    "[RevisionReconciler] {}: forced new revision (marker {})",
                    name,
                    marker
                );
                attempt.marker = Some(marker);
            }
            Err(e) => {
                attempt.advance(ReconcilePhase::Failed);
                let err = ConvergenceError::MutationRejected {
                    name: name.to_string(),
                    reason: e.to_string(),
                };
                tracing::error!("[RevisionReconciler] {}", err);
                return Err(err);
            }
        }

        attempt.advance(ReconcilePhase::Polling);
        let probe = self.probe.as_ref();
        let result = poll_until(
            name,
            &deadline,
            self.poll_interval,
            self.progress.as_ref(),
            move || async move {
                match probe.current_revision(name).await {
                    Ok(Some(revision)) if revision >= expected => PollOutcome::Matched(revision),
                    Ok(Some(revision)) => {
                        tracing::debug!(
                            "[RevisionReconciler] {}: at revision {}, waiting for {}",
                            name,
                            revision,
                            expected
                        );
                        PollOutcome::NotYetMatched
                    }
                    Ok(None) => PollOutcome::ProbeFailed("current revision not reported".into()),
                    Err(e) => PollOutcome::ProbeFailed(e.to_string()),
                }
            },
        )
        .await;

        match result {
            PollResult::Matched(observed) => {
                let applied = match self.probe.current_revision(name).await {
                    Ok(Some(revision)) if revision >= observed => revision,
                    _ => observed,
                };
                attempt.advance(ReconcilePhase::Converged);
                tracing::info!(
                    "[RevisionReconciler] {}: converged at revision {} after {:?}",
                    name,
                    applied,
                    deadline.elapsed()
                );
                Ok(applied)
            }
            PollResult::TimedOut { attempts } => {
                let observed = self.probe.current_revision(name).await.ok().flatten();
                if let Some(revision) = observed.filter(|r| *r >= expected) {
                    attempt.advance(ReconcilePhase::Converged);
                    tracing::info!(
                        "[RevisionReconciler] {}: converged at revision {} on final check",
                        name,
                        revision
                    );
                    return Ok(revision);
                }
                attempt.advance(ReconcilePhase::TimedOut);
                let err = ConvergenceError::ConvergenceTimeout {
                    name: name.to_string(),
                    expected,
                    observed,
                };
                tracing::error!("[RevisionReconciler] {} ({} attempts)", err, attempts);
                Err(err)
            }
        }
    }

    async fn read_baseline(&self, name: &str) -> Result<RevisionState, ConvergenceError> {
        let current = log_unreadable(name, "current", self.probe.current_revision(name).await);
        let latest = log_unreadable(
            name,
            "latest available",
            self.probe.latest_available_revision(name).await,
        );
        match (current, latest) {
            (Some(current_revision), Some(latest_available_revision)) => Ok(RevisionState {
                current_revision,
                latest_available_revision,
            }),
            (current, latest) => Err(ConvergenceError::InfoUnavailable {
                name: name.to_string(),
                current,
                latest,
            }),
        }
    }
}

fn log_unreadable(name: &str, label: &str, result: Result<Option<u64>, ProbeError>) -> Option<u64> {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                "[RevisionReconciler] {}: could not read {} revision: {}",
                name,
                label,
                e
            );
            None
        }
    }
}
