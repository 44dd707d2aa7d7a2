//! Public facade of the job engine: submit videos, read job state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::ExecutionBackend;
use crate::config::AppConfig;
use crate::dispatcher::{DispatchTask, Dispatcher};
use crate::error::JobError;
use crate::jobs::{JobEvent, JobRegistry, JobSummary, JobView, PerformanceLevel, StateMachine};
use crate::monitor::Monitor;

/// Owns the registry, the dispatch queue and its worker, and the monitors.
///
/// Job state is kept in memory only and is lost when the service is dropped.
pub struct JobService {
    config: AppConfig,
    registry: Arc<JobRegistry>,
    queue: mpsc::UnboundedSender<DispatchTask>,
    monitor: Monitor,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl JobService {
    /// Start the dispatch worker on the current tokio runtime.
    pub fn start(config: AppConfig, backend: Arc<dyn ExecutionBackend>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let shutdown = CancellationToken::new();
        let monitor = Monitor::new(
            Arc::clone(&registry),
            Arc::clone(&backend),
            config.poll_interval(),
            shutdown.child_token(),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&registry), backend, monitor.clone());

        let (queue, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(dispatcher.run(rx, shutdown.child_token()));

        Self {
            config,
            registry,
            queue,
            monitor,
            shutdown,
            worker,
        }
    }

    /// Accept a video for processing and return its job id.
    ///
    /// Returns as soon as the job is recorded as `PENDING`; the backend is
    /// contacted later by the dispatch worker, and its outcome is only
    /// visible through [`get_job`](Self::get_job). Fails without creating a
    /// job when the configuration is incomplete or the key is empty.
    pub fn submit(
        &self,
        video_key: &str,
        performance_level: PerformanceLevel,
    ) -> Result<Uuid, JobError> {
        let config = Arc::new(self.config.resolve()?);
        // Keys are opaque; surrounding spaces are part of the object name.
        if video_key.trim().is_empty() {
            return Err(JobError::EmptyVideoKey);
        }
        if self.queue.is_closed() {
            return Err(JobError::DispatcherClosed);
        }

        let job_id = Uuid::new_v4();
        self.registry
            .create(job_id, video_key.to_string(), performance_level)?;
        tracing::info!(%job_id, video_key, %performance_level, "Job submitted");

        let task = DispatchTask {
            job_id,
            video_key: video_key.to_string(),
            performance_level,
            config,
        };
        if self.queue.send(task).is_err() {
            self.registry.mutate(job_id, |job| {
                StateMachine::apply(
                    job,
                    JobEvent::DispatchFailed {
                        reason: "dispatcher stopped before the job was picked up".to_string(),
                    },
                    chrono::Utc::now(),
                )
            });
            return Err(JobError::DispatcherClosed);
        }
        Ok(job_id)
    }

    pub fn get_job(&self, job_id: Uuid) -> Result<JobView, JobError> {
        self.registry
            .get(job_id)
            .map(|job| job.view())
            .ok_or(JobError::JobNotFound(job_id))
    }

    /// Summaries of every job, oldest first.
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        self.registry
            .list_all()
            .iter()
            .map(|job| job.summary())
            .collect()
    }

    /// Number of jobs whose status is still being polled.
    pub fn active_monitors(&self) -> usize {
        self.monitor.active_count()
    }

    /// Stop the dispatch worker and every monitor. Running jobs stay
    /// `RUNNING` and get a final "monitoring stopped" log entry.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Dispatch worker panicked");
        }
    }
}
