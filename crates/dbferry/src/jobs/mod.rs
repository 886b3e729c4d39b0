//! In-memory job registry with per-job event channels.
//!
//! A [`Job`] tracks one long-running copy or export operation: its lifecycle
//! state, progress, append-only log and backend-specific stats. The store is
//! the only state shared across concurrent jobs; each record has exactly one
//! writer (the adapter executing that job), while any number of status-stream
//! observers subscribe to its event channel.
//!
//! Terminal jobs are garbage-collected by a background sweep after a fixed
//! retention window.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// How long terminal jobs are retained before the sweep deletes them.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(3600);

/// Interval between retention sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded capacity of each job's event channel.
const EVENT_CAPACITY: usize = 64;

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Copy,
    Export,
}

/// Job lifecycle state.
///
/// Transitions are `pending → running → {completed | failed}`; a terminal
/// state is never reversed (a retry is a brand-new job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Backend-specific progress counters.
///
/// `units` counts structural units completed (tables, collections or scan
/// pages worth of keys); `records` counts rows, documents or keys moved;
/// `total_records` is set only for backends where the total is knowable up
/// front (the key-value DBSIZE estimate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub units: u64,
    pub records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
}

impl JobStats {
    pub fn new(units: u64, records: u64) -> Self {
        Self {
            units,
            records,
            total_records: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_records = Some(total);
        self
    }
}

/// Observer-facing copy of a job's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: f64,
    pub logs: Vec<String>,
    pub stats: JobStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message published on a job's event channel.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The job record changed; carries the full new snapshot. A snapshot
    /// with a terminal status is the last event a subscriber will see.
    Updated(JobSnapshot),
    /// A single log line was appended.
    Log(String),
}

/// Partial update merged into a job record.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub stats: Option<JobStats>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_stats(mut self, stats: JobStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// A tracked job record plus its event channel.
struct Job {
    snapshot: JobSnapshot,
    events: broadcast::Sender<JobEvent>,
}

/// Concurrency-safe registry of job records, indexed by job id.
///
/// Mutations from different jobs never interact; each mutation publishes an
/// event so all current subscribers of that job observe it.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocate a new job in `pending` state and return its snapshot.
    ///
    /// Ids combine the creation time with a random suffix and are unique for
    /// the process lifetime.
    pub fn create(&self, job_type: JobType) -> JobSnapshot {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("job_{}_{}", Utc::now().timestamp_millis(), &suffix[..8]);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let snapshot = JobSnapshot {
            id: id.clone(),
            job_type,
            status: JobStatus::Pending,
            progress: 0.0,
            logs: Vec::new(),
            stats: JobStats::default(),
            error: None,
            created_at: Utc::now(),
        };
        let mut jobs = self.jobs.write().unwrap();
        jobs.insert(id, Job {
            snapshot: snapshot.clone(),
            events,
        });
        debug!(job_id = %snapshot.id, ?job_type, "created job");
        snapshot
    }

    /// Look up a job snapshot by id.
    pub fn get(&self, id: &str) -> Option<JobSnapshot> {
        self.jobs.read().unwrap().get(id).map(|j| j.snapshot.clone())
    }

    /// Merge a partial update into a job and publish an update event.
    ///
    /// No-op if the id is unknown.
    pub fn update(&self, id: &str, patch: JobPatch) {
        let mut jobs = self.jobs.write().unwrap();
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        if let Some(status) = patch.status {
            job.snapshot.status = status;
        }
        if let Some(progress) = patch.progress {
            job.snapshot.progress = progress;
        }
        if let Some(stats) = patch.stats {
            job.snapshot.stats = stats;
        }
        if let Some(error) = patch.error {
            job.snapshot.error = Some(error);
        }
        let _ = job.events.send(JobEvent::Updated(job.snapshot.clone()));
    }

    /// Append a timestamped line to a job's log.
    ///
    /// Publishes a log event followed by an update event. No-op if the id is
    /// unknown.
    pub fn append_log(&self, id: &str, message: impl Into<String>) {
        let line = format!("[{}] {}", Utc::now().format("%H:%M:%S"), message.into());
        let mut jobs = self.jobs.write().unwrap();
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        job.snapshot.logs.push(line.clone());
        let _ = job.events.send(JobEvent::Log(line));
        let _ = job.events.send(JobEvent::Updated(job.snapshot.clone()));
    }

    /// Subscribe to a job's event channel.
    ///
    /// Returns `None` if the id is unknown. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self, id: &str) -> Option<broadcast::Receiver<JobEvent>> {
        self.jobs.read().unwrap().get(id).map(|j| j.events.subscribe())
    }

    /// Number of tracked jobs (terminal included until swept).
    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().unwrap().is_empty()
    }

    /// Delete terminal jobs older than the retention window.
    ///
    /// Returns the number of jobs removed.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(RETENTION_WINDOW).unwrap();
        let mut jobs = self.jobs.write().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| !(job.snapshot.status.is_terminal() && job.snapshot.created_at < cutoff));
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, "swept expired jobs");
        }
        removed
    }

    /// Spawn the periodic retention sweep owned by this store's lifecycle.
    pub fn spawn_retention_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; skip it so fresh jobs age first.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }

    #[cfg(test)]
    fn backdate(&self, id: &str, by: chrono::Duration) {
        let mut jobs = self.jobs.write().unwrap();
        if let Some(job) = jobs.get_mut(id) {
            job.snapshot.created_at = job.snapshot.created_at - by;
        }
    }
}

/// Handle a running adapter uses to report on its job.
///
/// Bundles the store and the job id so adapter code reads as a sequence of
/// progress statements rather than store plumbing. The context is the job's
/// single writer.
#[derive(Clone)]
pub struct JobContext {
    store: Arc<JobStore>,
    job_id: String,
}

impl JobContext {
    pub fn new(store: Arc<JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Append a line to the job log.
    pub fn log(&self, message: impl Into<String>) {
        self.store.append_log(&self.job_id, message);
    }

    /// Merge a partial update into the job.
    pub fn update(&self, patch: JobPatch) {
        self.store.update(&self.job_id, patch);
    }

    /// Mark the job running with zero progress.
    pub fn running(&self) {
        self.update(JobPatch::status(JobStatus::Running).with_progress(0.0));
    }

    /// Set the job's progress percentage.
    pub fn progress(&self, progress: f64) {
        self.update(JobPatch::default().with_progress(progress));
    }

    /// Push updated stats counters.
    pub fn stats(&self, stats: JobStats) {
        self.update(JobPatch::default().with_stats(stats));
    }

    /// Mark the job completed with full progress.
    pub fn complete(&self) {
        self.update(JobPatch::status(JobStatus::Completed).with_progress(100.0));
    }

    /// Record a fatal error: the message is appended to the log before the
    /// terminal state is set, giving observers a causal trail.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.log(format!("Error: {message}"));
        self.update(JobPatch::status(JobStatus::Failed).with_error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_pending_with_unique_ids() {
        let store = JobStore::new();
        let a = store.create(JobType::Copy);
        let b = store.create(JobType::Export);

        assert_eq!(a.status, JobStatus::Pending);
        assert_eq!(a.progress, 0.0);
        assert!(a.logs.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_update_merges_and_unknown_id_is_noop() {
        let store = JobStore::new();
        let job = store.create(JobType::Copy);

        store.update(
            &job.id,
            JobPatch::status(JobStatus::Running).with_progress(33.3),
        );
        store.update(&job.id, JobPatch::default().with_stats(JobStats::new(1, 1000)));

        let snap = store.get(&job.id).unwrap();
        assert_eq!(snap.status, JobStatus::Running);
        assert_eq!(snap.progress, 33.3);
        assert_eq!(snap.stats.records, 1000);

        // Unknown id never panics or creates a record
        store.update("job_0_missing", JobPatch::status(JobStatus::Failed));
        assert!(store.get("job_0_missing").is_none());
    }

    #[test]
    fn test_logs_are_append_only_prefix() {
        let store = JobStore::new();
        let job = store.create(JobType::Copy);

        store.append_log(&job.id, "Starting migration...");
        let first = store.get(&job.id).unwrap().logs;

        store.append_log(&job.id, "Connected to source.");
        store.append_log(&job.id, "Connected to target.");
        let second = store.get(&job.id).unwrap().logs;

        assert_eq!(second.len(), 3);
        assert_eq!(&second[..first.len()], &first[..]);
        assert!(second[0].contains("Starting migration..."));
    }

    #[tokio::test]
    async fn test_subscribers_observe_mutations_in_order() {
        let store = JobStore::new();
        let job = store.create(JobType::Copy);
        let mut rx = store.subscribe(&job.id).unwrap();

        store.append_log(&job.id, "hello");
        store.update(&job.id, JobPatch::status(JobStatus::Running).with_progress(50.0));

        match rx.recv().await.unwrap() {
            JobEvent::Log(line) => assert!(line.contains("hello")),
            other => panic!("expected log event, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            JobEvent::Updated(snap) => assert_eq!(snap.logs.len(), 1),
            other => panic!("expected update event, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            JobEvent::Updated(snap) => {
                assert_eq!(snap.status, JobStatus::Running);
                assert_eq!(snap.progress, 50.0);
            }
            other => panic!("expected update event, got {other:?}"),
        }
    }

    #[test]
    fn test_context_fail_logs_before_terminal_state() {
        let store = JobStore::new();
        let job = store.create(JobType::Copy);
        let ctx = JobContext::new(Arc::clone(&store), &job.id);

        ctx.running();
        ctx.fail("connection refused");

        let snap = store.get(&job.id).unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("connection refused"));
        assert!(snap.logs.last().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_context_complete_sets_full_progress() {
        let store = JobStore::new();
        let job = store.create(JobType::Export);
        let ctx = JobContext::new(Arc::clone(&store), &job.id);

        ctx.running();
        ctx.progress(66.6);
        ctx.complete();

        let snap = store.get(&job.id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100.0);
    }

    #[test]
    fn test_sweep_removes_only_expired_terminal_jobs() {
        let store = JobStore::new();
        let fresh_terminal = store.create(JobType::Copy);
        let old_terminal = store.create(JobType::Copy);
        let old_running = store.create(JobType::Copy);

        store.update(&fresh_terminal.id, JobPatch::status(JobStatus::Completed));
        store.update(&old_terminal.id, JobPatch::status(JobStatus::Failed));
        store.update(&old_running.id, JobPatch::status(JobStatus::Running));
        store.backdate(&old_terminal.id, chrono::Duration::hours(2));
        store.backdate(&old_running.id, chrono::Duration::hours(2));

        assert_eq!(store.sweep(), 1);
        assert!(store.get(&old_terminal.id).is_none());
        assert!(store.get(&fresh_terminal.id).is_some());
        assert!(store.get(&old_running.id).is_some());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let store = JobStore::new();
        let job = store.create(JobType::Copy);
        store.update(
            &job.id,
            JobPatch::default().with_stats(JobStats::new(2, 500).with_total(1000)),
        );

        let json = serde_json::to_value(store.get(&job.id).unwrap()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["jobType"], "copy");
        assert_eq!(json["stats"]["totalRecords"], 1000);
    }
}
