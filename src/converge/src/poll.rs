//! Fixed-interval polling against an absolute deadline.
//!
//! Shared by the restart watcher and the revision reconciler. The deadline is
//! computed once when an operation starts and is never extended; a transient
//! probe failure is retried at the next interval like any other non-match.

use crate::progress::ProgressReporter;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Default interval between probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Result of a single probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// Target state observed; carries the observed value
    Matched(T),
    /// Probe worked but the target state is not there yet
    NotYetMatched,
    /// Collaborator failed transiently; retried, never counted as progress
    ProbeFailed(String),
}

/// Result of a whole polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult<T> {
    Matched(T),
    TimedOut { attempts: u32 },
}

impl<T> PollResult<T> {
    pub fn is_matched(&self) -> bool {
        matches!(self, PollResult::Matched(_))
    }
}

/// Absolute point in monotonic time owned by one operation
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Share of the total window already used, clamped to 100
    pub fn consumed_percentage(&self) -> u32 {
        let total = self.at.saturating_duration_since(self.started).as_millis();
        if total == 0 {
            return 100;
        }
        let used = self.elapsed().as_millis().min(total);
        (used * 100 / total) as u32
    }
}

/// Invoke `probe` every `interval` until it matches or `deadline` passes.
///
/// No probe is started once the deadline has been reached; the last sleep is
/// clamped to the remaining time so the loop ends on the deadline itself.
pub async fn poll_until<T, F, Fut>(
    target: &str,
    deadline: &Deadline,
    interval: Duration,
    progress: &dyn ProgressReporter,
    mut probe: F,
) -> PollResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollOutcome<T>>,
{
    let interval = interval.max(Duration::from_millis(1));
    let mut attempts: u32 = 0;

    loop {
        if deadline.is_expired() {
            progress.finish(target);
            tracing::warn!(
                "[poll] {} timed out after {} attempts ({:?})",
                target,
                attempts,
                deadline.elapsed()
            );
            return PollResult::TimedOut { attempts };
        }

        attempts += 1;
        match probe().await {
            PollOutcome::Matched(value) => {
                progress.finish(target);
                tracing::debug!("[poll] {} matched on attempt {}", target, attempts);
                return PollResult::Matched(value);
            }
            PollOutcome::NotYetMatched => {
                tracing::debug!("[poll] {} not yet matched (attempt {})", target, attempts);
            }
            PollOutcome::ProbeFailed(reason) => {
                tracing::warn!(
                    "[poll] {} probe failed (attempt {}), retrying: {}",
                    target,
                    attempts,
                    reason
                );
            }
        }

        progress.emit(
            target,
            deadline.consumed_percentage(),
            format!("waiting ({} attempts, {}s left)", attempts, deadline.remaining().as_secs()),
        );

        let remaining = deadline.remaining();
        if !remaining.is_zero() {
            sleep(interval.min(remaining)).await;
        }
    }
}
