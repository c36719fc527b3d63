//! RestartWatcher: confirms a control-plane container was replaced by a new,
//! running instance after the container runtime restarted.

use crate::error::{ConvergenceError, ProbeError};
use crate::poll::{poll_until, Deadline, PollOutcome, PollResult};
use crate::probe::StatusProbe;
use crate::progress::ProgressReporter;
use crate::types::ComponentIdentity;
use std::sync::Arc;
use std::time::Duration;

pub struct RestartWatcher {
    probe: Arc<dyn StatusProbe>,
    progress: Arc<dyn ProgressReporter>,
    poll_interval: Duration,
}

impl RestartWatcher {
    pub fn new(
        probe: Arc<dyn StatusProbe>,
        progress: Arc<dyn ProgressReporter>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            probe,
            progress,
            poll_interval,
        }
    }

    /// Read the identity to use as the baseline before a restart
    pub async fn capture_identity(&self, name: &str) -> Result<ComponentIdentity, ProbeError> {
        let identity = self.probe.container_snapshot(name).await?;
        tracing::info!(
            "[RestartWatcher] Baseline for {}: id={:?} state={}",
            name,
            identity.instance_id,
            identity.state
        );
        Ok(identity)
    }

    /// Block until `name` runs under an identity different from `prior`.
    ///
    /// Returns the new identity. Fails with `NotRunning` once `timeout` has
    /// elapsed and a final check still does not show a restarted instance.
    pub async fn wait_for_restart(
        &self,
        name: &str,
        prior: &str,
        timeout: Duration,
    ) -> Result<ComponentIdentity, ConvergenceError> {
        let deadline = Deadline::after(timeout);
        tracing::info!(
            "[RestartWatcher] Waiting up to {}s for {} to restart (prior id {:?})",
            timeout.as_secs(),
            name,
            prior
        );

        let probe = self.probe.as_ref();
        let result = poll_until(
            name,
            &deadline,
            self.poll_interval,
            self.progress.as_ref(),
            move || async move { classify(probe.container_snapshot(name).await, prior) },
        )
        .await;

        match result {
            PollResult::Matched(identity) => {
                tracing::info!(
                    "[RestartWatcher] {} restarted: {:?} -> {:?} after {:?}",
                    name,
                    prior,
                    identity.instance_id_or_empty(),
                    deadline.elapsed()
                );
                Ok(identity)
            }
            PollResult::TimedOut { attempts } => self.final_check(name, prior, attempts).await,
        }
    }

    async fn final_check(
        &self,
        name: &str,
        prior: &str,
        attempts: u32,
    ) -> Result<ComponentIdentity, ConvergenceError> {
        let snapshot = self.probe.container_snapshot(name).await;
        let (observed_id, observed_state) = match snapshot {
            Ok(identity) if identity.is_restarted_from(prior) => {
                tracing::info!(
                    "[RestartWatcher] {} restart confirmed on final check: id={}",
                    name,
                    identity.instance_id_or_empty()
                );
                return Ok(identity);
            }
            Ok(identity) => (identity.instance_id, identity.state),
            Err(e) => {
                tracing::warn!("[RestartWatcher] Final check for {} failed: {}", name, e);
                (None, crate::types::LifecycleState::Unknown)
            }
        };

        let err = ConvergenceError::NotRunning {
            name: name.to_string(),
            prior: prior.to_string(),
            observed_id,
            observed_state,
        };
        tracing::error!("[RestartWatcher] {} ({} attempts)", err, attempts);
        Err(err)
    }
}

fn classify(
    snapshot: Result<ComponentIdentity, ProbeError>,
    prior: &str,
) -> PollOutcome<ComponentIdentity> {
    match snapshot {
        Ok(identity) if identity.is_restarted_from(prior) => PollOutcome::Matched(identity),
        Ok(identity) => {
            tracing::debug!(
                "[RestartWatcher] {} not restarted yet: id={:?} state={}",
                identity.name,
                identity.instance_id,
                identity.state
            );
            PollOutcome::NotYetMatched
        }
        Err(e) => PollOutcome::ProbeFailed(e.to_string()),
    }
}
