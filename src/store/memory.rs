//! In-memory store implementation for RelayQ.
//!
//! This backend keeps all job state in process memory behind a single
//! async mutex. Every trait operation is one critical section, so the
//! atomicity contract of [`Store`] holds trivially: a concurrent claim can
//! never observe a job mid-move or win the same job twice. It's the right
//! backend for development, testing and single-process applications where
//! persistence across restarts is not required.

use super::{JobMutation, JobPredicate, Partition, Store, StoreResult};
use crate::job::{Job, JobId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Job records indexed by id
    jobs: HashMap<JobId, Job>,
    /// One FIFO id list per partition
    waiting: VecDeque<JobId>,
    active: VecDeque<JobId>,
    delayed: VecDeque<JobId>,
    completed: VecDeque<JobId>,
    failed: VecDeque<JobId>,
}

impl Inner {
    fn list(&self, partition: Partition) -> &VecDeque<JobId> {
        match partition {
            Partition::Waiting => &self.waiting,
            Partition::Active => &self.active,
            Partition::Delayed => &self.delayed,
            Partition::Completed => &self.completed,
            Partition::Failed => &self.failed,
        }
    }

    fn list_mut(&mut self, partition: Partition) -> &mut VecDeque<JobId> {
        match partition {
            Partition::Waiting => &mut self.waiting,
            Partition::Active => &mut self.active,
            Partition::Delayed => &mut self.delayed,
            Partition::Completed => &mut self.completed,
            Partition::Failed => &mut self.failed,
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(&self, partition: Partition, job: Job) -> StoreResult<JobId> {
        let id = job.id.clone();
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(id.clone(), job);
        inner.list_mut(partition).push_back(id.clone());

        tracing::debug!(job_id = %id, partition = %partition, "appended job");
        Ok(id)
    }

    async fn move_first(
        &self,
        from: Partition,
        to: Partition,
        predicate: JobPredicate<'_>,
        mutation: JobMutation<'_>,
    ) -> StoreResult<Option<Job>> {
        let mut inner = self.inner.lock().await;

        let found = inner.list(from).iter().enumerate().find_map(|(index, id)| {
            inner
                .jobs
                .get(id)
                .filter(|job| predicate(job))
                .map(|_| (index, id.clone()))
        });

        let Some((position, id)) = found else {
            return Ok(None);
        };

        inner.list_mut(from).remove(position);
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        mutation(job);
        let moved = job.clone();
        inner.list_mut(to).push_back(id.clone());

        tracing::debug!(job_id = %id, from = %from, to = %to, "moved first matching job");
        Ok(Some(moved))
    }

    async fn move_job(
        &self,
        id: &JobId,
        from: Partition,
        to: Partition,
        mutation: JobMutation<'_>,
    ) -> StoreResult<Option<Job>> {
        let mut inner = self.inner.lock().await;

        let Some(position) = inner.list(from).iter().position(|member| member == id) else {
            return Ok(None);
        };

        inner.list_mut(from).remove(position);
        let Some(job) = inner.jobs.get_mut(id) else {
            return Ok(None);
        };
        mutation(job);
        let moved = job.clone();
        inner.list_mut(to).push_back(id.clone());

        tracing::debug!(job_id = %id, from = %from, to = %to, "moved job");
        Ok(Some(moved))
    }

    async fn read_all(&self, partition: Partition) -> StoreResult<Vec<Job>> {
        let inner = self.inner.lock().await;
        let jobs = inner
            .list(partition)
            .iter()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect();
        Ok(jobs)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(id).cloned())
    }

    async fn count(&self, partition: Partition) -> StoreResult<usize> {
        let inner = self.inner.lock().await;
        Ok(inner.list(partition).len())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let inner = self.inner.lock().await;
        tracing::debug!(
            total_jobs = inner.jobs.len(),
            waiting = inner.waiting.len(),
            active = inner.active.len(),
            "store health check"
        );
        Ok(())
    }
}
