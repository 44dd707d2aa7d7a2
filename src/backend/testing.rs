//! Scripted in-memory backend for engine tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{BackendError, ExecutionBackend, RunRequest, TaskDescriptor, TaskPhase};

pub const TASK_ARN: &str = "arn:aws:ecs:eu-west-1:123456789012:task/transcode-cluster/0f3a";

type DescribeResult = Result<Option<TaskDescriptor>, BackendError>;

/// Replays canned answers. A handle with its own script is answered from
/// it first, then from the shared script. Once both run out, every further
/// query reports a running task.
#[derive(Default)]
pub struct ScriptedBackend {
    run_result: Mutex<Option<Result<Vec<String>, BackendError>>>,
    describes: Mutex<VecDeque<DescribeResult>>,
    per_handle: Mutex<HashMap<String, VecDeque<DescribeResult>>>,
    stalled: Mutex<HashSet<String>>,
    gate: Option<Arc<Notify>>,
    run_calls: AtomicUsize,
    describe_calls: AtomicUsize,
    describe_log: Mutex<Vec<(String, Instant)>>,
    last_request: Mutex<Option<RunRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for the (single) run request. Defaults to one [`TASK_ARN`].
    pub fn run_returns(self, result: Result<Vec<String>, BackendError>) -> Self {
        *self.run_result.lock() = Some(result);
        self
    }

    pub fn describe_sequence(self, answers: Vec<DescribeResult>) -> Self {
        *self.describes.lock() = answers.into();
        self
    }

    /// Answers for queries about one handle only.
    pub fn describe_for(self, handle: &str, answers: Vec<DescribeResult>) -> Self {
        self.per_handle
            .lock()
            .insert(handle.to_string(), answers.into());
        self
    }

    /// Queries about `handle` never return.
    pub fn stall(self, handle: &str) -> Self {
        self.stalled.lock().insert(handle.to_string());
        self
    }

    /// Hold every run request until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn describe_times(&self) -> Vec<Instant> {
        self.describe_log.lock().iter().map(|(_, at)| *at).collect()
    }

    pub fn describe_times_for(&self, handle: &str) -> Vec<Instant> {
        self.describe_log
            .lock()
            .iter()
            .filter(|(h, _)| h == handle)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn last_request(&self) -> Option<RunRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn run_execution(&self, req: &RunRequest) -> Result<Vec<String>, BackendError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(req.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.run_result
            .lock()
            .take()
            .unwrap_or_else(|| Ok(vec![TASK_ARN.to_string()]))
    }

    async fn describe_execution(
        &self,
        _cluster: &str,
        handle: &str,
    ) -> Result<Option<TaskDescriptor>, BackendError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        self.describe_log
            .lock()
            .push((handle.to_string(), Instant::now()));

        let stalled = self.stalled.lock().contains(handle);
        if stalled {
            std::future::pending::<()>().await;
        }

        let own = self
            .per_handle
            .lock()
            .get_mut(handle)
            .and_then(VecDeque::pop_front);
        own.or_else(|| self.describes.lock().pop_front())
            .unwrap_or_else(|| Ok(Some(TaskDescriptor::active(TaskPhase::Running))))
    }
}
