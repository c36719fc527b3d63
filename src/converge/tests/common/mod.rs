//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use converge::{
    ComponentIdentity, LifecycleState, MutationCommand, MutationError, ProbeError,
    ProgressReporter, StatusProbe,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

/// Pops scripted values in order; the last value repeats once the script runs out.
struct Script<T: Clone> {
    values: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    fn new(values: Vec<T>) -> Self {
        Self {
            values: values.into(),
        }
    }

    fn next(&mut self) -> Option<T> {
        if self.values.len() > 1 {
            self.values.pop_front()
        } else {
            self.values.front().cloned()
        }
    }
}

#[derive(Default)]
pub struct ScriptedProbe {
    snapshots: Mutex<HashMap<String, Script<Result<ComponentIdentity, ProbeError>>>>,
    current: Mutex<HashMap<String, Script<Result<Option<u64>, ProbeError>>>>,
    latest: Mutex<HashMap<String, Script<Result<Option<u64>, ProbeError>>>>,
    snapshot_times: Mutex<Vec<Instant>>,
    current_calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshots(
        self,
        name: &str,
        snapshots: Vec<Result<ComponentIdentity, ProbeError>>,
    ) -> Self {
        self.snapshots
            .lock()
            .unwrap()
            .insert(name.to_string(), Script::new(snapshots));
        self
    }

    pub fn with_current(self, name: &str, values: Vec<Result<Option<u64>, ProbeError>>) -> Self {
        self.current
            .lock()
            .unwrap()
            .insert(name.to_string(), Script::new(values));
        self
    }

    pub fn with_latest(self, name: &str, values: Vec<Result<Option<u64>, ProbeError>>) -> Self {
        self.latest
            .lock()
            .unwrap()
            .insert(name.to_string(), Script::new(values));
        self
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_times.lock().unwrap().len()
    }

    pub fn snapshot_times(&self) -> Vec<Instant> {
        self.snapshot_times.lock().unwrap().clone()
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn container_identity(&self, name: &str) -> Result<Option<String>, ProbeError> {
        Ok(self.container_snapshot(name).await?.instance_id)
    }

    async fn container_state(&self, name: &str) -> Result<Option<LifecycleState>, ProbeError> {
        Ok(Some(self.container_snapshot(name).await?.state))
    }

    async fn container_snapshot(&self, name: &str) -> Result<ComponentIdentity, ProbeError> {
        self.snapshot_times.lock().unwrap().push(Instant::now());
        self.snapshots
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(Script::next)
            .unwrap_or_else(|| Ok(ComponentIdentity::absent(name)))
    }

    async fn current_revision(&self, name: &str) -> Result<Option<u64>, ProbeError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.current
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(Script::next)
            .unwrap_or(Ok(None))
    }

    async fn latest_available_revision(&self, name: &str) -> Result<Option<u64>, ProbeError> {
        self.latest
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(Script::next)
            .unwrap_or(Ok(None))
    }
}

/// Records forced rollouts; optionally rejects them
#[derive(Default)]
pub struct RecordingMutation {
    reject_with: Option<String>,
    calls: Mutex<Vec<String>>,
    markers: converge::cluster::MarkerSource,
}

impl RecordingMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MutationCommand for RecordingMutation {
    async fn force_new_revision(&self, name: &str) -> Result<String, MutationError> {
        self.calls.lock().unwrap().push(name.to_string());
        if let Some(reason) = &self.reject_with {
            return Err(MutationError::Rejected(reason.clone()));
        }
        Ok(self.markers.next())
    }
}

/// Counts progress events
#[derive(Default)]
pub struct CountingProgress {
    pub emitted: AtomicUsize,
    pub finished: AtomicUsize,
}

impl ProgressReporter for CountingProgress {
    fn emit(&self, _target: &str, _percentage: u32, _message: String) {
        self.emitted.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self, _target: &str) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn running(name: &str, id: &str) -> Result<ComponentIdentity, ProbeError> {
    Ok(ComponentIdentity::new(
        name,
        Some(id.to_string()),
        LifecycleState::Running,
    ))
}

pub fn starting(name: &str, id: &str) -> Result<ComponentIdentity, ProbeError> {
    Ok(ComponentIdentity::new(
        name,
        Some(id.to_string()),
        LifecycleState::Starting,
    ))
}

pub fn probe_failure() -> ProbeError {
    ProbeError::Command("connection refused".to_string())
}
