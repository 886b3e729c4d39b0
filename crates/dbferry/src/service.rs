//! Migration facade tying the job store, registry and adapters together.
//!
//! This is the surface a transport layer calls: verify a connection, launch a
//! copy, observe a job's status stream, or run an export straight into a
//! response body. Copies run detached; the facade owns the funnel that turns
//! an adapter's fatal `Err` into the job's `failed` state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::adapters::DbAdapter;
use crate::api::{Backend, MigrateRequest, StartResponse, StatusFrame, VerifyResponse};
use crate::archive::{ArchiveBuilder, ArchiveSink};
use crate::error::Result;
use crate::jobs::{JobContext, JobEvent, JobSnapshot, JobStore, JobType};
use crate::registry::AdapterRegistry;

/// Fallback poll interval for status streams.
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of a status stream's frame buffer.
const STREAM_BUFFER: usize = 16;

/// Engine facade over the registry and the job store.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct MigrationService {
    store: Arc<JobStore>,
    registry: Arc<AdapterRegistry>,
    sweeper: tokio::task::JoinHandle<()>,
}

impl MigrationService {
    /// Build the service and start the job retention sweep.
    ///
    /// Must be called within a tokio runtime.
    pub fn new() -> Self {
        let store = JobStore::new();
        let sweeper = store.spawn_retention_sweep();
        Self {
            store,
            registry: Arc::new(AdapterRegistry::new()),
            sweeper,
        }
    }

    /// The underlying job store.
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Check that a backend can be reached at `uri`.
    ///
    /// Shape errors short-circuit before any connection attempt; a live probe
    /// failure is reported, not returned as an error.
    pub async fn verify(&self, backend: Backend, uri: &str) -> VerifyResponse {
        if let Err(e) = backend.validate_uri(uri) {
            return VerifyResponse::failed(e.to_string());
        }
        if self.registry.resolve(backend).verify_connection(uri).await {
            VerifyResponse::ok()
        } else {
            VerifyResponse::failed("Connection failed")
        }
    }

    /// Validate a copy request, create its job and launch it detached.
    ///
    /// Returns as soon as the job exists; progress is observed through
    /// [`MigrationService::status`].
    pub fn start_copy(&self, request: MigrateRequest) -> Result<StartResponse> {
        request.validate()?;
        let backend = request.backend();
        let job = self.store.create(JobType::Copy);
        let ctx = JobContext::new(Arc::clone(&self.store), &job.id);
        let registry = Arc::clone(&self.registry);
        let (source_uri, target_uri) = request.uris();
        let source_uri = source_uri.to_string();
        let target_uri = target_uri.to_string();

        info!(job_id = %job.id, %backend, "starting copy job");
        tokio::spawn(async move {
            let adapter = registry.resolve(backend);
            if let Err(e) = adapter.run_copy(&ctx, &source_uri, &target_uri).await {
                ctx.fail(e.to_string());
            }
        });

        Ok(StartResponse {
            job_id: job.id,
            message: "Migration started".to_string(),
        })
    }

    /// Point-in-time snapshot of a job.
    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        self.store.get(job_id)
    }

    /// Live status stream for a job, or `None` if the id is unknown.
    ///
    /// The first frame is an immediate snapshot; afterwards one frame per job
    /// mutation, with a fallback poll that re-checks the store in case an
    /// update was dropped. The stream ends after a terminal frame, so a
    /// stream opened on an already-terminal job yields exactly one frame.
    pub fn status(&self, job_id: &str) -> Option<ReceiverStream<StatusFrame>> {
        let snapshot = self.store.get(job_id)?;
        let events = self.store.subscribe(job_id)?;
        let store = Arc::clone(&self.store);
        let job_id = job_id.to_string();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let terminal = snapshot.status.is_terminal();
            if tx.send(StatusFrame::from(snapshot)).await.is_err() || terminal {
                return;
            }
            Self::forward_status(store, job_id, events, tx).await;
        });
        Some(ReceiverStream::new(rx))
    }

    async fn forward_status(
        store: Arc<JobStore>,
        job_id: String,
        mut events: broadcast::Receiver<JobEvent>,
        tx: mpsc::Sender<StatusFrame>,
    ) {
        let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick is immediate; the initial snapshot already went out.
        ticker.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(JobEvent::Updated(snap)) => {
                        let terminal = snap.status.is_terminal();
                        if tx.send(snap.into()).await.is_err() || terminal {
                            return;
                        }
                    }
                    // Every log append is followed by an update event
                    Ok(JobEvent::Log(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(%job_id, missed, "status stream lagged, resyncing");
                        match store.get(&job_id) {
                            Some(snap) => {
                                let terminal = snap.status.is_terminal();
                                if tx.send(snap.into()).await.is_err() || terminal {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Job swept mid-stream; emit the last known state
                        if let Some(snap) = store.get(&job_id) {
                            let _ = tx.send(snap.into()).await;
                        }
                        return;
                    }
                },
                _ = ticker.tick() => {
                    // Fallback poll so a terminal state never goes unnoticed
                    match store.get(&job_id) {
                        Some(snap) if snap.status.is_terminal() => {
                            let _ = tx.send(snap.into()).await;
                            return;
                        }
                        Some(_) => {}
                        None => return,
                    }
                }
            }
        }
    }

    /// Run an export of `source_uri` into `sink` as a tracked job.
    ///
    /// Awaits completion: the caller streams the sink's read side while this
    /// future drives the write side. On success the archive is finalized and
    /// the job completed; on failure the job is failed and the error
    /// propagated so the transport can abort the response.
    pub async fn download(
        &self,
        backend: Backend,
        source_uri: &str,
        sink: ArchiveSink,
    ) -> Result<()> {
        backend.validate_uri(source_uri)?;
        let job = self.store.create(JobType::Export);
        let ctx = JobContext::new(Arc::clone(&self.store), &job.id);
        info!(job_id = %job.id, %backend, "starting export job");

        let mut archive = ArchiveBuilder::new(sink);
        let adapter = self.registry.resolve(backend);
        let outcome = async {
            adapter.run_export(&ctx, source_uri, &mut archive).await?;
            archive.finalize().await
        }
        .await;

        match outcome {
            Ok(()) => {
                ctx.complete();
                Ok(())
            }
            Err(e) => {
                ctx.fail(e.to_string());
                Err(e)
            }
        }
    }
}

impl Default for MigrationService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MigrationService {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobPatch, JobStats, JobStatus};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_verify_rejects_bad_scheme_without_connecting() {
        let service = MigrationService::new();
        let resp = service
            .verify(Backend::Postgres, "mysql://localhost/app")
            .await;
        assert!(!resp.success);
        assert!(resp.message.contains("Invalid postgres URI"));

        let resp = service.verify(Backend::Redis, "").await;
        assert!(!resp.success);
        assert!(resp.message.contains("Missing URI"));
    }

    #[tokio::test]
    async fn test_start_copy_rejects_invalid_request() {
        let service = MigrationService::new();
        let request = MigrateRequest::Mongodb {
            source_uri: "mongodb://a/app".into(),
            target_uri: "postgres://b/app".into(),
        };
        assert!(service.start_copy(request).is_err());
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_start_copy_registers_job_immediately() {
        let service = MigrationService::new();
        let request = MigrateRequest::Redis {
            source_uri: "redis://127.0.0.1:1".into(),
            target_uri: "redis://127.0.0.1:1".into(),
        };
        let resp = service.start_copy(request).unwrap();
        assert!(resp.job_id.starts_with("job_"));
        assert!(service.snapshot(&resp.job_id).is_some());
    }

    #[tokio::test]
    async fn test_status_of_unknown_job_is_none() {
        let service = MigrationService::new();
        assert!(service.status("job_0_missing").is_none());
    }

    #[tokio::test]
    async fn test_status_on_terminal_job_yields_single_frame() {
        let service = MigrationService::new();
        let job = service.store().create(JobType::Copy);
        service
            .store()
            .update(&job.id, JobPatch::status(JobStatus::Completed).with_progress(100.0));

        let mut stream = service.status(&job.id).unwrap();
        let frame = stream.next().await.unwrap();
        assert_eq!(frame.status, JobStatus::Completed);
        assert_eq!(frame.progress, 100.0);
        // Terminal frame is the last one
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_status_streams_updates_until_terminal() {
        let service = MigrationService::new();
        let job = service.store().create(JobType::Copy);
        let ctx = JobContext::new(Arc::clone(service.store()), &job.id);

        let mut stream = service.status(&job.id).unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.status, JobStatus::Pending);

        ctx.running();
        let frame = stream.next().await.unwrap();
        assert_eq!(frame.status, JobStatus::Running);

        ctx.update(
            JobPatch::default()
                .with_progress(50.0)
                .with_stats(JobStats::new(1, 1000)),
        );
        let frame = stream.next().await.unwrap();
        assert_eq!(frame.progress, 50.0);
        assert_eq!(frame.stats.records, 1000);

        ctx.complete();
        // Skip the log-driven frames until the terminal one
        let mut last = stream.next().await.unwrap();
        while !last.status.is_terminal() {
            last = stream.next().await.unwrap();
        }
        assert_eq!(last.status, JobStatus::Completed);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_download_rejects_bad_uri_before_creating_job() {
        let service = MigrationService::new();
        let (tx, _rx) = tokio::io::duplex(1024);
        let result = service
            .download(Backend::Mongodb, "redis://nope", Box::new(tx))
            .await;
        assert!(result.is_err());
        assert!(service.store().is_empty());
    }
}
