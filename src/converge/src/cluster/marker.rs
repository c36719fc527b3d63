/// Change markers for forced redeployments
use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces `forceRedeploymentReason` values.
///
/// Each value is the current UTC timestamp with nanoseconds plus a sequence
/// number, so two calls never yield the same marker even when the clock does
/// not advance between them.
#[derive(Debug)]
pub struct MarkerSource {
    prefix: String,
    sequence: AtomicU64,
}

impl MarkerSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!(
            "{}-{}-{}",
            self.prefix,
            Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            seq
        )
    }
}

impl Default for MarkerSource {
    fn default() -> Self {
        Self::new("recovery")
    }
}
