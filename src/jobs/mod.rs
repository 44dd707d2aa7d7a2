mod record;
mod registry;
mod state;

pub use record::{JobRecord, JobStatus, JobSummary, JobView, LogEntry, PerformanceLevel};
pub use registry::JobRegistry;
pub use state::{
    JobEvent, MONITORING_STOPPED, NOW_PROCESSING, PollReport, StateMachine, StopOutcome,
    Transition,
};
