use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Not configured, missing: {}", .missing.join(", "))]
    NotConfigured { missing: Vec<&'static str> },

    #[error("Video key must not be empty")]
    EmptyVideoKey,

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Job already exists: {0}")]
    DuplicateJob(Uuid),

    #[error("Unknown performance level: {0}")]
    InvalidPerformanceLevel(String),

    #[error("Poll interval must be at least one second")]
    InvalidPollInterval,

    #[error("Dispatcher is no longer accepting jobs")]
    DispatcherClosed,
}
