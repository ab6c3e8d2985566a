//! Scripted collaborators for tests
//!
//! Every fake counts its calls so tests can assert how often the oracle,
//! change source and publisher were reached.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::change::ChangeSource;
use crate::oracle::Oracle;
use crate::publish::{ArtifactId, Publisher};
use crate::review::{AnalysisUnit, ChangedUnit, FormattedOutput, TargetId};
use crate::{Error, Result};

type ErrorFactory = Box<dyn Fn() -> Error + Send + Sync>;

/// Oracle answering from scripts
///
/// Per-unit scripts are consumed first, then the shared script, then the
/// fallback (a fixed response or a fixed error).
pub struct ScriptedOracle {
    shared: Mutex<VecDeque<Result<String>>>,
    per_unit: Mutex<HashMap<String, VecDeque<Result<String>>>>,
    fallback_text: Option<String>,
    fallback_error: Option<ErrorFactory>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    fn empty() -> Self {
        Self {
            shared: Mutex::new(VecDeque::new()),
            per_unit: Mutex::new(HashMap::new()),
            fallback_text: None,
            fallback_error: None,
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer from `script` in order, failing once it runs out
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            shared: Mutex::new(script.into()),
            ..Self::empty()
        }
    }

    /// Always answer `text`
    pub fn always(text: &str) -> Self {
        Self {
            fallback_text: Some(text.to_string()),
            ..Self::empty()
        }
    }

    /// Always fail with a fresh error from `make`
    pub fn failing(make: impl Fn() -> Error + Send + Sync + 'static) -> Self {
        Self {
            fallback_error: Some(Box::new(make)),
            ..Self::empty()
        }
    }

    /// Queue a response for one unit
    pub fn with_unit_response(self, unit_id: &str, response: Result<String>) -> Self {
        self.per_unit
            .lock()
            .unwrap()
            .entry(unit_id.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, unit_id: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|u| *u == unit_id).count()
    }

    /// Unit ids in call order
    pub fn units_seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, unit_id: &str) -> Result<String> {
        if let Some(response) = self
            .per_unit
            .lock()
            .unwrap()
            .get_mut(unit_id)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        if let Some(response) = self.shared.lock().unwrap().pop_front() {
            return response;
        }
        if let Some(text) = &self.fallback_text {
            return Ok(text.clone());
        }
        match &self.fallback_error {
            Some(make) => Err(make()),
            None => Err(Error::Other("oracle script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn analyze(&self, unit: &AnalysisUnit) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(unit.unit_id.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next_response(&unit.unit_id)
    }
}

/// Changed file with a patch
pub fn changed(path: &str, patch: &str) -> ChangedUnit {
    ChangedUnit {
        unit_id: path.to_string(),
        patch_text: patch.to_string(),
        added_count: patch.lines().filter(|l| l.starts_with('+')).count() as u64,
        removed_count: patch.lines().filter(|l| l.starts_with('-')).count() as u64,
    }
}

/// Change source over fixed content
pub struct FakeChangeSource {
    diff: String,
    units: Vec<ChangedUnit>,
    whole_diff_too_large: bool,
    whole_diff_calls: AtomicUsize,
    changed_units_calls: AtomicUsize,
}

impl FakeChangeSource {
    pub fn new(diff: &str, units: Vec<ChangedUnit>) -> Self {
        Self {
            diff: diff.to_string(),
            units,
            whole_diff_too_large: false,
            whole_diff_calls: AtomicUsize::new(0),
            changed_units_calls: AtomicUsize::new(0),
        }
    }

    /// Refuse the whole diff as too large
    pub fn with_whole_diff_too_large(mut self) -> Self {
        self.whole_diff_too_large = true;
        self
    }

    pub fn whole_diff_calls(&self) -> usize {
        self.whole_diff_calls.load(Ordering::SeqCst)
    }

    pub fn changed_units_calls(&self) -> usize {
        self.changed_units_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeSource for FakeChangeSource {
    async fn get_whole_diff(&self, _target: &TargetId) -> Result<String> {
        self.whole_diff_calls.fetch_add(1, Ordering::SeqCst);
        if self.whole_diff_too_large {
            return Err(Error::PayloadTooLarge("diff exceeds the maximum".to_string()));
        }
        Ok(self.diff.clone())
    }

    async fn get_changed_units(&self, _target: &TargetId) -> Result<Vec<ChangedUnit>> {
        self.changed_units_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.units.clone())
    }
}

#[derive(Default)]
struct PublisherState {
    existing: Option<ArtifactId>,
    next_id: ArtifactId,
    created: Vec<FormattedOutput>,
    superseded: Vec<ArtifactId>,
    continuations: Vec<String>,
    last_signature: Option<String>,
    create_failures: usize,
    continuation_failures: usize,
}

/// Publisher recording everything it is asked to do
///
/// Created artifacts get ids from 100 upwards and become the existing
/// artifact; superseding the existing artifact clears it.
pub struct RecordingPublisher {
    state: Mutex<PublisherState>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PublisherState {
                next_id: 100,
                ..PublisherState::default()
            }),
        }
    }

    pub fn with_existing(id: ArtifactId) -> Self {
        let publisher = Self::new();
        publisher.state.lock().unwrap().existing = Some(id);
        publisher
    }

    /// Fail the next `count` creates with a transient error
    pub fn with_create_failures(self, count: usize) -> Self {
        self.state.lock().unwrap().create_failures = count;
        self
    }

    /// Fail the next `count` continuations with a transient error
    pub fn with_continuation_failures(self, count: usize) -> Self {
        self.state.lock().unwrap().continuation_failures = count;
        self
    }

    /// Forget the existing artifact, as if it was deleted on the platform
    pub fn clear_existing(&self) {
        self.state.lock().unwrap().existing = None;
    }

    pub fn existing(&self) -> Option<ArtifactId> {
        self.state.lock().unwrap().existing
    }

    pub fn created(&self) -> Vec<FormattedOutput> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn superseded(&self) -> Vec<ArtifactId> {
        self.state.lock().unwrap().superseded.clone()
    }

    pub fn continuations(&self) -> Vec<String> {
        self.state.lock().unwrap().continuations.clone()
    }

    pub fn last_signature(&self) -> Option<String> {
        self.state.lock().unwrap().last_signature.clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn find_existing(
        &self,
        _target: &TargetId,
        signature: &str,
    ) -> Result<Option<ArtifactId>> {
        let mut state = self.state.lock().unwrap();
        state.last_signature = Some(signature.to_string());
        Ok(state.existing)
    }

    async fn create(&self, _target: &TargetId, output: &FormattedOutput) -> Result<ArtifactId> {
        let mut state = self.state.lock().unwrap();
        if state.create_failures > 0 {
            state.create_failures -= 1;
            return Err(Error::TransientUpstream("publisher unavailable".to_string()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.created.push(output.clone());
        state.existing = Some(id);
        Ok(id)
    }

    async fn supersede(&self, _target: &TargetId, artifact: ArtifactId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.superseded.push(artifact);
        if state.existing == Some(artifact) {
            state.existing = None;
        }
        Ok(())
    }

    async fn create_continuation(&self, _target: &TargetId, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.continuation_failures > 0 {
            state.continuation_failures -= 1;
            return Err(Error::TransientUpstream("publisher unavailable".to_string()));
        }
        state.continuations.push(text.to_string());
        Ok(())
    }
}
