//! Test doubles for the orchestrator and worker collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use explain_jobs::db::{JobRecordStore, RecordError};
use explain_jobs::models::importance::ImportanceTensor;
use explain_jobs::models::job::{DispatchPayload, JobRecord, JobState};
use explain_jobs::services::engine::{EngineError, Explanation, ExplainabilityEngine, RawPrediction};
use explain_jobs::services::fetch::{FetchError, ImageSource};
use explain_jobs::services::orchestrator::Orchestrator;
use explain_jobs::services::queue::{Dispatcher, QueueError};
use explain_jobs::services::storage::{ArtifactProbe, ArtifactStore, StorageError};

/// In-memory Artifact Store that counts reads per path and can be told to fail.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    reads: Mutex<HashMap<String, usize>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Writes to paths containing this fragment fail.
    pub fail_writes_matching: Mutex<Option<String>>,
}

impl MemoryArtifactStore {
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.lock().unwrap().get(path).map(|(_, ct)| ct.clone())
    }

    pub fn json(&self, path: &str) -> Option<serde_json::Value> {
        self.object(path).map(|data| serde_json::from_slice(&data).unwrap())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn reads_of(&self, path: &str) -> usize {
        self.reads.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().values().sum()
    }

    /// Place an artifact directly, as a worker in another process would.
    pub fn insert(&self, path: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (data, "application/json".to_string()));
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Status(503));
        }
        if let Some(fragment) = self.fail_writes_matching.lock().unwrap().as_deref() {
            if path.contains(fragment) {
                return Err(StorageError::Status(503));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn get(&self, path: &str) -> ArtifactProbe {
        *self.reads.lock().unwrap().entry(path.to_string()).or_default() += 1;
        if self.fail_reads.load(Ordering::SeqCst) {
            return ArtifactProbe::Fault(StorageError::Unavailable("injected fault".to_string()));
        }
        match self.objects.lock().unwrap().get(path) {
            Some((data, _)) => ArtifactProbe::Found(data.clone()),
            None => ArtifactProbe::NotFound,
        }
    }
}

/// In-memory job records with write-count instrumentation.
#[derive(Default)]
pub struct MemoryJobStore {
    records: Mutex<HashMap<Uuid, JobRecord>>,
    pub inserts: AtomicUsize,
    pub finalize_calls: AtomicUsize,
    pub finalize_writes: AtomicUsize,
    pub fail_inserts: AtomicBool,
    /// Applied as a competing reconciler's finalize just before the next
    /// caller's finalize lands.
    pub preempt_finalize: Mutex<Option<(JobState, DateTime<Utc>)>>,
}

impl MemoryJobStore {
    pub fn record(&self, job_id: Uuid) -> Option<JobRecord> {
        self.records.lock().unwrap().get(&job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn finalize_now(&self, job_id: Uuid, state: &JobState, completed_at: DateTime<Utc>) -> bool {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&job_id) {
            Some(record) if !record.state.is_terminal() => {
                record.state = state.clone();
                record.completed_at = Some(completed_at);
                self.finalize_writes.fetch_add(1, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobRecordStore for MemoryJobStore {
    async fn insert(&self, record: &JobRecord) -> Result<(), RecordError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RecordError::Unavailable("injected fault".to_string()));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(record.job_id, record.clone());
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>, RecordError> {
        Ok(self.record(job_id))
    }

    async fn finalize(
        &self,
        job_id: Uuid,
        state: &JobState,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, RecordError> {
        let competing = self.preempt_finalize.lock().unwrap().take();
        if let Some((other_state, other_completed_at)) = competing {
            self.finalize_now(job_id, &other_state, other_completed_at);
        }
        Ok(self.finalize_now(job_id, state, completed_at))
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<JobRecord>, RecordError> {
        let mut records: Vec<JobRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }
}

/// Records dispatched payloads instead of running anything.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub dispatched: Mutex<Vec<DispatchPayload>>,
    pub fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn payloads(&self) -> Vec<DispatchPayload> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, payload: &DispatchPayload) -> Result<(), QueueError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QueueError::Rejected("injected fault".to_string()));
        }
        self.dispatched.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Serves fixed bytes, or a fixed HTTP status.
pub struct StubImageSource {
    pub status: Option<u16>,
}

impl StubImageSource {
    pub fn ok() -> Self {
        Self { status: None }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            status: Some(status),
        }
    }
}

#[async_trait]
impl ImageSource for StubImageSource {
    async fn fetch(&self, _image_ref: &str) -> Result<Vec<u8>, FetchError> {
        match self.status {
            Some(status) => Err(FetchError::Status(status)),
            None => Ok(b"\x89PNG fake image bytes".to_vec()),
        }
    }
}

/// Engine returning a canned explanation, or an error.
pub struct StubEngine {
    pub outcome: Result<Explanation, String>,
    pub calls: AtomicUsize,
}

impl StubEngine {
    pub fn returning(class_index: usize, confidence: f64, importance: ImportanceTensor) -> Self {
        Self {
            outcome: Ok(Explanation {
                prediction: RawPrediction {
                    class_index,
                    confidence,
                },
                importance,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExplainabilityEngine for StubEngine {
    async fn compute(&self, _image: &[u8]) -> Result<Explanation, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(EngineError::Failed)
    }
}

/// Orchestrator wired to in-memory collaborators.
pub struct Harness {
    pub artifacts: Arc<MemoryArtifactStore>,
    pub records: Arc<MemoryJobStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        let artifacts = Arc::new(MemoryArtifactStore::default());
        let records = Arc::new(MemoryJobStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let orchestrator = Orchestrator::new(artifacts.clone(), records.clone(), dispatcher.clone());
        Self {
            artifacts,
            records,
            dispatcher,
            orchestrator,
        }
    }
}
