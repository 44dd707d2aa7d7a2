use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::record::{JobRecord, PerformanceLevel};
use crate::error::JobError;

/// In-memory map from job id to [`JobRecord`].
///
/// One lock guards the whole map. Closures passed to [`mutate`](Self::mutate)
/// run under the write lock and must not block; nothing in this module awaits.
/// Records are never evicted, so the map lives as long as the process.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<IndexMap<Uuid, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `Pending` record and return a copy of it.
    pub fn create(
        &self,
        id: Uuid,
        video_key: String,
        performance_level: PerformanceLevel,
    ) -> Result<JobRecord, JobError> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&id) {
            return Err(JobError::DuplicateJob(id));
        }
        let record = JobRecord::new(id, video_key, performance_level, Utc::now());
        jobs.insert(id, record.clone());
        Ok(record)
    }

    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().get(&id).cloned()
    }

    /// Every record, in insertion order.
    pub fn list_all(&self) -> Vec<JobRecord> {
        self.jobs.read().values().cloned().collect()
    }

    /// Apply `f` to the record in place. Returns `None` for an unknown id.
    pub fn mutate<R>(&self, id: Uuid, f: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        self.jobs.write().get_mut(&id).map(f)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
