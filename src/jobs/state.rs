use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{JobRecord, JobStatus};
use crate::backend::TaskPhase;

/// Log line appended the first time a task is seen fully running.
pub const NOW_PROCESSING: &str = "Task is running; the video is now being processed";

/// Last log line of a job whose monitor stopped before the job finished,
/// after a failed status query or a cancellation.
pub const MONITORING_STOPPED: &str =
    "Status monitoring stopped; the task may still be progressing on the backend";

/// How a stopped task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOutcome {
    /// The primary container exited with code 0.
    Succeeded,
    /// The primary container exited with a non-zero code.
    ExitedWithCode(i32),
    /// The container exited but the backend did not report a code.
    ExitCodeUnavailable,
    /// The task stopped for another reason (provisioning failure, user stop,
    /// spot interruption). Carries the stop code.
    Abnormal(String),
}

/// What one poll of the backend found, already classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollReport {
    /// The backend does not know the handle.
    Missing { handle: String },
    /// The task is still provisioning, pending, running or in a phase
    /// without special handling.
    Active { phase: TaskPhase },
    Stopped {
        outcome: StopOutcome,
        stopped_reason: Option<String>,
        sub_unit_reasons: Vec<String>,
    },
}

/// Everything that can happen to a job after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEvent {
    /// The dispatcher picked the job up and is about to call the backend.
    DispatchStarted { cluster: String },
    /// The backend accepted the run request.
    Dispatched { handle: String },
    /// The run request was rejected, returned no task, or never completed.
    DispatchFailed { reason: String },
    Polled(PollReport),
    /// The status query itself failed.
    PollFailed { error: String },
    /// Monitoring was cancelled while the job was still active.
    MonitoringCancelled,
}

/// The result of applying an event to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The job is still active; polling goes on.
    Continue(JobStatus),
    /// The job entered a terminal status.
    Terminal(JobStatus),
    /// Monitoring stops but the status is left as it was.
    Halt,
    /// The event was dropped: the job is already terminal or the event
    /// would overwrite a write-once field.
    Ignored,
}

impl Transition {
    /// Whether a monitor seeing this transition schedules another poll.
    pub fn keeps_polling(&self) -> bool {
        matches!(self, Transition::Continue(_))
    }
}

/// Drives a [`JobRecord`] through the job state machine.
///
/// `PENDING -> RUNNING -> {COMPLETED, FAILED}`. Status and the matching log
/// entries change together in one call, so a reader holding the record never
/// sees one without the other.
pub struct StateMachine;

impl StateMachine {
    pub fn apply(job: &mut JobRecord, event: JobEvent, at: DateTime<Utc>) -> Transition {
        if job.status.is_terminal() {
            return Transition::Ignored;
        }

        match event {
            JobEvent::DispatchStarted { cluster } => {
                job.status = JobStatus::Running;
                job.log(
                    at,
                    format!("Status changed to RUNNING; starting task on cluster {cluster}"),
                );
                Transition::Continue(job.status)
            }
            JobEvent::Dispatched { handle } => {
                if job.execution_handle.is_some() {
                    return Transition::Ignored;
                }
                job.log(at, format!("Task started: {handle}"));
                job.execution_handle = Some(handle);
                Transition::Continue(job.status)
            }
            JobEvent::DispatchFailed { reason } => {
                Self::fail(job, at, format!("Job FAILED: could not start task: {reason}"))
            }
            JobEvent::Polled(report) => Self::apply_report(job, report, at),
            JobEvent::PollFailed { error } => {
                job.log(at, format!("Error checking task status: {error}"));
                job.log(at, MONITORING_STOPPED);
                Transition::Halt
            }
            JobEvent::MonitoringCancelled => {
                job.log(at, MONITORING_STOPPED);
                Transition::Halt
            }
        }
    }

    fn apply_report(job: &mut JobRecord, report: PollReport, at: DateTime<Utc>) -> Transition {
        match report {
            PollReport::Missing { handle } => Self::fail(
                job,
                at,
                format!("Job FAILED: task {handle} was not found on the cluster"),
            ),
            PollReport::Active { phase } => {
                job.status = JobStatus::Running;
                if phase == TaskPhase::Running && !job.running_notified {
                    job.running_notified = true;
                    job.log(at, NOW_PROCESSING);
                }
                Transition::Continue(job.status)
            }
            PollReport::Stopped {
                outcome,
                stopped_reason,
                sub_unit_reasons,
            } => {
                let (status, message) = match outcome {
                    StopOutcome::Succeeded => (
                        JobStatus::Completed,
                        "Job COMPLETED: video processed successfully".to_string(),
                    ),
                    StopOutcome::ExitedWithCode(code) => (
                        JobStatus::Failed,
                        format!("Job FAILED: container exited with code {code}"),
                    ),
                    StopOutcome::ExitCodeUnavailable => (
                        JobStatus::Failed,
                        "Job FAILED: container exited, exit code unavailable".to_string(),
                    ),
                    StopOutcome::Abnormal(stop_code) => (
                        JobStatus::Failed,
                        format!("Job FAILED: task stopped ({stop_code})"),
                    ),
                };
                job.status = status;
                job.log(at, message);
                if let Some(reason) = stopped_reason {
                    job.log(at, format!("Stop reason: {reason}"));
                }
                for reason in sub_unit_reasons {
                    job.log(at, format!("Container reason: {reason}"));
                }
                Transition::Terminal(status)
            }
        }
    }

    fn fail(job: &mut JobRecord, at: DateTime<Utc>, message: String) -> Transition {
        job.status = JobStatus::Failed;
        job.log(at, message);
        Transition::Terminal(JobStatus::Failed)
    }
}
