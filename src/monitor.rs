//! Per-job status polling.
//!
//! Every dispatched job gets its own tokio task that asks the backend about
//! the job's execution handle, feeds the answer through the
//! [`StateMachine`], and sleeps for the poll interval before asking again.
//! A monitor ends when the job turns terminal, when a poll request fails, or
//! when it is cancelled. Polls of one job never overlap; monitors of
//! different jobs run independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::backend::types::STOP_CODE_ESSENTIAL_EXITED;
use crate::backend::{ExecutionBackend, TaskDescriptor, TaskPhase};
use crate::jobs::{JobEvent, JobRegistry, PollReport, StateMachine, StopOutcome, Transition};

/// Default delay between two polls of the same job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Turn a backend answer into a [`PollReport`].
///
/// The first sub-unit is the primary container: the job succeeded only if
/// the task stopped because that container exited, with code 0.
pub fn classify(handle: &str, descriptor: Option<TaskDescriptor>) -> PollReport {
    let Some(descriptor) = descriptor else {
        return PollReport::Missing {
            handle: handle.to_string(),
        };
    };

    if descriptor.phase != TaskPhase::Stopped {
        return PollReport::Active {
            phase: descriptor.phase,
        };
    }

    let outcome = match descriptor.stop_code.as_deref() {
        Some(STOP_CODE_ESSENTIAL_EXITED) => {
            match descriptor.sub_units.first().and_then(|u| u.exit_code) {
                Some(0) => StopOutcome::Succeeded,
                Some(code) => StopOutcome::ExitedWithCode(code),
                None => StopOutcome::ExitCodeUnavailable,
            }
        }
        Some(other) => StopOutcome::Abnormal(other.to_string()),
        None => StopOutcome::Abnormal("unknown stop code".to_string()),
    };

    let sub_unit_reasons = descriptor
        .sub_units
        .iter()
        .filter_map(|unit| {
            let reason = unit.reason.as_deref()?;
            Some(match unit.name.as_deref() {
                Some(name) => format!("{name}: {reason}"),
                None => reason.to_string(),
            })
        })
        .collect();

    PollReport::Stopped {
        outcome,
        stopped_reason: descriptor.stopped_reason,
        sub_unit_reasons,
    }
}

struct MonitorInner {
    registry: Arc<JobRegistry>,
    backend: Arc<dyn ExecutionBackend>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    // Dropping a guard cancels that job's polling task.
    active: Mutex<HashMap<Uuid, DropGuard>>,
}

/// Spawns and tracks polling tasks. Cheap to clone.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    pub fn new(
        registry: Arc<JobRegistry>,
        backend: Arc<dyn ExecutionBackend>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                registry,
                backend,
                poll_interval,
                shutdown,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start polling `handle` for `job_id`. The first poll happens
    /// immediately. Starting a second monitor for the same job cancels the
    /// first one.
    ///
    /// The returned handle resolves to the transition that ended monitoring.
    pub fn spawn(&self, job_id: Uuid, cluster: String, handle: String) -> JoinHandle<Transition> {
        let token = self.inner.shutdown.child_token();
        self.inner
            .active
            .lock()
            .insert(job_id, token.clone().drop_guard());

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tracing::debug!(%job_id, %handle, "Monitor started");
            let last = inner.watch(job_id, &cluster, &handle, &token).await;
            if !token.is_cancelled() {
                inner.active.lock().remove(&job_id);
            } else if inner.shutdown.is_cancelled() || !inner.active.lock().contains_key(&job_id) {
                // Stopped by `cancel` or shutdown; a replacement monitor
                // leaves its guard in the map and takes over the job.
                inner.record_cancelled(job_id);
            }
            tracing::debug!(%job_id, ?last, "Monitor finished");
            last
        })
    }

    /// Stop polling a job. The job keeps its status and gets a
    /// [`MONITORING_STOPPED`](crate::jobs::MONITORING_STOPPED) log entry.
    /// Returns `false` if no monitor was running for it.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        self.inner.active.lock().remove(&job_id).is_some()
    }

    /// Number of jobs currently being polled.
    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }
}

impl MonitorInner {
    async fn watch(
        &self,
        job_id: Uuid,
        cluster: &str,
        handle: &str,
        token: &CancellationToken,
    ) -> Transition {
        loop {
            let transition = tokio::select! {
                biased;
                _ = token.cancelled() => return Transition::Halt,
                t = self.poll_once(job_id, cluster, handle) => t,
            };
            if !transition.keeps_polling() {
                return transition;
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Transition::Halt,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn record_cancelled(&self, job_id: Uuid) {
        let transition = self
            .registry
            .mutate(job_id, |job| {
                StateMachine::apply(job, JobEvent::MonitoringCancelled, Utc::now())
            })
            .unwrap_or(Transition::Ignored);
        tracing::info!(%job_id, ?transition, "Monitoring cancelled");
    }

    async fn poll_once(&self, job_id: Uuid, cluster: &str, handle: &str) -> Transition {
        let event = match self.backend.describe_execution(cluster, handle).await {
            Ok(descriptor) => JobEvent::Polled(classify(handle, descriptor)),
            Err(e) => {
                tracing::warn!(%job_id, handle, error = %e, "Task status query failed");
                JobEvent::PollFailed {
                    error: e.to_string(),
                }
            }
        };

        let transition = self
            .registry
            .mutate(job_id, |job| StateMachine::apply(job, event, Utc::now()))
            .unwrap_or(Transition::Ignored);

        match transition {
            Transition::Terminal(status) => {
                tracing::info!(%job_id, handle, %status, "Job reached terminal status");
            }
            Transition::Halt => {
                tracing::warn!(%job_id, handle, "Monitoring halted, job status may be stale");
            }
            Transition::Continue(_) | Transition::Ignored => {
                tracing::debug!(%job_id, handle, ?transition, "Poll cycle done");
            }
        }
        transition
    }
}
