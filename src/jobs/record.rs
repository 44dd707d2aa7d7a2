use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Tracks the lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// `Completed` and `Failed` are never left once entered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Caller-chosen hint passed through to the transcoding task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceLevel {
    Economy,
    #[default]
    Standard,
    Premium,
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceLevel::Economy => write!(f, "economy"),
            PerformanceLevel::Standard => write!(f, "standard"),
            PerformanceLevel::Premium => write!(f, "premium"),
        }
    }
}

impl FromStr for PerformanceLevel {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Ok(PerformanceLevel::Economy),
            "standard" => Ok(PerformanceLevel::Standard),
            "premium" => Ok(PerformanceLevel::Premium),
            _ => Err(JobError::InvalidPerformanceLevel(s.to_string())),
        }
    }
}

/// One line of a job's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// The state tracked for one submitted video.
///
/// Fields are only writable from the `jobs` module so that every change goes
/// through [`StateMachine::apply`](super::StateMachine::apply): logs are
/// append-only and the execution handle is set at most once.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub(super) id: Uuid,
    pub(super) video_key: String,
    pub(super) performance_level: PerformanceLevel,
    pub(super) status: JobStatus,
    pub(super) start_time: DateTime<Utc>,
    pub(super) execution_handle: Option<String>,
    pub(super) logs: Vec<LogEntry>,
    pub(super) running_notified: bool,
}

impl JobRecord {
    /// A fresh `Pending` record holding its creation log entry.
    pub fn new(
        id: Uuid,
        video_key: String,
        performance_level: PerformanceLevel,
        at: DateTime<Utc>,
    ) -> Self {
        let created =
            format!("Job created for video {video_key} (performance level: {performance_level})");
        let mut record = Self {
            id,
            video_key,
            performance_level,
            status: JobStatus::Pending,
            start_time: at,
            execution_handle: None,
            logs: Vec::new(),
            running_notified: false,
        };
        record.log(at, created);
        record
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn video_key(&self) -> &str {
        &self.video_key
    }

    pub fn performance_level(&self) -> PerformanceLevel {
        self.performance_level
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn execution_handle(&self) -> Option<&str> {
        self.execution_handle.as_deref()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn running_notified(&self) -> bool {
        self.running_notified
    }

    pub(super) fn log(&mut self, at: DateTime<Utc>, message: impl Into<String>) {
        self.logs.push(LogEntry {
            timestamp: at,
            message: message.into(),
        });
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id,
            status: self.status,
            start_time: self.start_time,
            video_key: self.video_key.clone(),
            performance_level: self.performance_level,
            execution_handle: self.execution_handle.clone(),
            logs: self.logs.clone(),
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            status: self.status,
            start_time: self.start_time,
            video_key: self.video_key.clone(),
        }
    }
}

/// Full read-only projection of a job, logs included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub id: Uuid,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub video_key: String,
    pub performance_level: PerformanceLevel,
    pub execution_handle: Option<String>,
    pub logs: Vec<LogEntry>,
}

/// Listing projection of a job, without logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub video_key: String,
}
