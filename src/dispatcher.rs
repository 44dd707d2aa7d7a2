//! Hands submitted jobs to the execution backend.
//!
//! [`JobService::submit`](crate::service::JobService::submit) only records the
//! job and pushes a [`DispatchTask`] onto a queue. [`Dispatcher::run`] drains
//! that queue in the background; each task gets exactly one run request, and
//! a started task is handed over to the [`Monitor`].

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{ExecutionBackend, NetworkSpec, RunRequest};
use crate::config::ResolvedConfig;
use crate::jobs::{JobEvent, JobRegistry, PerformanceLevel, StateMachine, Transition};
use crate::monitor::Monitor;

/// One queued dispatch, carrying the configuration read at submit time.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub job_id: Uuid,
    pub video_key: String,
    pub performance_level: PerformanceLevel,
    pub config: Arc<ResolvedConfig>,
}

/// Build the backend request for a task: target cluster and task definition,
/// network placement, and the environment the transcoder reads.
pub fn build_run_request(task: &DispatchTask) -> RunRequest {
    let config = &task.config;
    RunRequest {
        cluster: config.cluster.clone(),
        task_definition: config.task_definition.clone(),
        container_name: config.container_name.clone(),
        network: NetworkSpec {
            subnets: config.subnets.clone(),
            security_groups: config.security_groups.clone(),
            assign_public_ip: config.assign_public_ip,
        },
        environment: vec![
            ("INPUT_BUCKET".to_string(), config.bucket.clone()),
            ("INPUT_KEY".to_string(), task.video_key.clone()),
            (
                "PERFORMANCE_LEVEL".to_string(),
                task.performance_level.to_string(),
            ),
            ("JOB_ID".to_string(), task.job_id.to_string()),
        ],
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    backend: Arc<dyn ExecutionBackend>,
    monitor: Monitor,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        backend: Arc<dyn ExecutionBackend>,
        monitor: Monitor,
    ) -> Self {
        Self {
            registry,
            backend,
            monitor,
        }
    }

    /// Consume the queue until it closes or `shutdown` fires. Every task is
    /// dispatched on its own tokio task so a slow backend answer for one job
    /// does not hold up the next.
    pub async fn run(
        self,
        mut queue: mpsc::UnboundedReceiver<DispatchTask>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                task = queue.recv() => match task {
                    Some(task) => {
                        let dispatcher = self.clone();
                        tokio::spawn(async move { dispatcher.dispatch(task).await });
                    }
                    None => {
                        tracing::info!("Dispatch queue closed");
                        break;
                    }
                },
            }
        }
    }

    /// Dispatch one job: mark it running, send the run request once, record
    /// the outcome, and start monitoring on success.
    pub async fn dispatch(&self, task: DispatchTask) -> Transition {
        let job_id = task.job_id;
        let started = self
            .registry
            .mutate(job_id, |job| {
                StateMachine::apply(
                    job,
                    JobEvent::DispatchStarted {
                        cluster: task.config.cluster.clone(),
                    },
                    Utc::now(),
                )
            })
            .unwrap_or(Transition::Ignored);
        if !started.keeps_polling() {
            tracing::warn!(%job_id, ?started, "Job not dispatchable");
            return started;
        }

        let req = build_run_request(&task);
        let event = match self.backend.run_execution(&req).await {
            Ok(handles) => match handles.into_iter().next() {
                Some(handle) => JobEvent::Dispatched { handle },
                None => JobEvent::DispatchFailed {
                    reason: "backend started no task".to_string(),
                },
            },
            Err(e) => JobEvent::DispatchFailed {
                reason: e.to_string(),
            },
        };
        let handle = match &event {
            JobEvent::Dispatched { handle } => Some(handle.clone()),
            _ => None,
        };

        let transition = self
            .registry
            .mutate(job_id, |job| StateMachine::apply(job, event, Utc::now()))
            .unwrap_or(Transition::Ignored);

        match (transition, handle) {
            (Transition::Continue(_), Some(handle)) => {
                tracing::info!(%job_id, %handle, "Task started, monitoring");
                self.monitor.spawn(job_id, req.cluster, handle);
            }
            (transition, _) => {
                tracing::error!(%job_id, ?transition, "Dispatch failed");
            }
        }
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{ScriptedBackend, TASK_ARN};
    use crate::backend::{BackendError, TaskDescriptor};
    use crate::config::test_config;
    use crate::jobs::{JobStatus, NOW_PROCESSING};
    use crate::monitor::DEFAULT_POLL_INTERVAL;
    use std::time::Duration;

    fn task_for(registry: &JobRegistry, video_key: &str) -> DispatchTask {
        let id = Uuid::new_v4();
        registry
            .create(id, video_key.into(), PerformanceLevel::Premium)
            .unwrap();
        DispatchTask {
            job_id: id,
            video_key: video_key.into(),
            performance_level: PerformanceLevel::Premium,
            config: Arc::new(test_config().resolve().unwrap()),
        }
    }

    fn dispatcher_with(backend: Arc<ScriptedBackend>) -> (Dispatcher, Arc<JobRegistry>, Monitor) {
        let registry = Arc::new(JobRegistry::new());
        let monitor = Monitor::new(
            Arc::clone(&registry),
            backend.clone(),
            DEFAULT_POLL_INTERVAL,
            CancellationToken::new(),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&registry), backend, monitor.clone());
        (dispatcher, registry, monitor)
    }

    #[test]
    fn run_request_carries_placement_and_environment() {
        let registry = JobRegistry::new();
        let task = task_for(&registry, "uploads/a.mp4");
        let req = build_run_request(&task);

        assert_eq!(req.cluster, "transcode-cluster");
        assert_eq!(req.task_definition, "transcoder:3");
        assert_eq!(req.container_name, "transcoder");
        assert_eq!(req.network.subnets, vec!["subnet-a", "subnet-b"]);
        assert_eq!(req.network.security_groups, vec!["sg-1"]);
        assert!(req.network.assign_public_ip);
        assert_eq!(req.env("INPUT_BUCKET"), Some("uploads-bucket"));
        assert_eq!(req.env("INPUT_KEY"), Some("uploads/a.mp4"));
        assert_eq!(req.env("PERFORMANCE_LEVEL"), Some("premium"));
        assert_eq!(req.env("JOB_ID"), Some(task.job_id.to_string().as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn success_records_handle_and_starts_monitor() {
        let backend = Arc::new(ScriptedBackend::new().describe_sequence(vec![Ok(Some(
            TaskDescriptor::exited(0),
        ))]));
        let (dispatcher, registry, monitor) = dispatcher_with(Arc::clone(&backend));
        let task = task_for(&registry, "uploads/a.mp4");
        let id = task.job_id;

        let t = dispatcher.dispatch(task).await;
        assert_eq!(t, Transition::Continue(JobStatus::Running));
        assert_eq!(backend.run_calls(), 1);
        assert_eq!(monitor.active_count(), 1);

        let job = registry.get(id).unwrap();
        assert_eq!(job.execution_handle(), Some(TASK_ARN));
        assert!(job.logs().iter().any(|l| l.message.contains(TASK_ARN)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(registry.get(id).unwrap().status(), JobStatus::Completed);
        assert_eq!(monitor.active_count(), 0);
    }

    #[tokio::test]
    async fn rejection_fails_without_monitoring() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .run_returns(Err(BackendError::Rejected("RESOURCE:MEMORY".into()))),
        );
        let (dispatcher, registry, monitor) = dispatcher_with(Arc::clone(&backend));
        let task = task_for(&registry, "uploads/a.mp4");
        let id = task.job_id;

        let t = dispatcher.dispatch(task).await;
        assert_eq!(t, Transition::Terminal(JobStatus::Failed));
        assert_eq!(monitor.active_count(), 0);
        assert_eq!(backend.describe_calls(), 0);

        let job = registry.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.execution_handle().is_none());
        assert!(job.logs().last().unwrap().message.contains("RESOURCE:MEMORY"));
    }

    #[tokio::test]
    async fn empty_handle_list_is_a_failure() {
        let backend = Arc::new(ScriptedBackend::new().run_returns(Ok(Vec::new())));
        let (dispatcher, registry, _monitor) = dispatcher_with(Arc::clone(&backend));
        let task = task_for(&registry, "uploads/a.mp4");
        let id = task.job_id;

        dispatcher.dispatch(task).await;
        let job = registry.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(!job.logs().iter().any(|l| l.message == NOW_PROCESSING));
    }

    #[tokio::test]
    async fn transport_error_is_a_failure_and_not_retried() {
        let backend = Arc::new(
            ScriptedBackend::new().run_returns(Err(BackendError::Request("timed out".into()))),
        );
        let (dispatcher, registry, _monitor) = dispatcher_with(Arc::clone(&backend));
        let task = task_for(&registry, "uploads/a.mp4");
        let id = task.job_id;

        dispatcher.dispatch(task).await;
        assert_eq!(backend.run_calls(), 1);
        assert_eq!(registry.get(id).unwrap().status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_job_is_not_dispatched() {
        let backend = Arc::new(ScriptedBackend::new());
        let (dispatcher, registry, _monitor) = dispatcher_with(Arc::clone(&backend));
        let mut task = task_for(&registry, "uploads/a.mp4");
        task.job_id = Uuid::new_v4();

        assert_eq!(dispatcher.dispatch(task).await, Transition::Ignored);
        assert_eq!(backend.run_calls(), 0);
    }
}
