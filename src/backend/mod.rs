pub mod ecs;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use ecs::EcsBackend;
pub use error::BackendError;
pub use types::{NetworkSpec, RunRequest, SubUnit, TaskDescriptor, TaskPhase};

use async_trait::async_trait;

/// The remote compute service that runs one task per job.
///
/// Implementations are stateless request issuers: the engine calls them
/// concurrently from the dispatcher and every active monitor.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Starts one execution unit and returns the handles the backend
    /// assigned. An empty vector means nothing was started.
    async fn run_execution(&self, req: &RunRequest) -> Result<Vec<String>, BackendError>;

    /// Describes an execution unit. `Ok(None)` means the backend does not
    /// know the handle.
    async fn describe_execution(
        &self,
        cluster: &str,
        handle: &str,
    ) -> Result<Option<TaskDescriptor>, BackendError>;
}
