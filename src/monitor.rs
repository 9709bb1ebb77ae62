//! Read-only monitoring queries over the job store.
//!
//! The monitor is the operator-facing half of the queue: a dashboard or
//! health endpoint renders whatever it returns. It never mutates state, so
//! it can be cloned freely and polled from anywhere without interfering
//! with workers.

use crate::error::RelayResult;
use crate::job::{JobState, JobSummary};
use crate::store::{Partition, SharedStore};
use std::time::{Duration, SystemTime};

/// Per-partition job counts at one observation point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionCounts {
    /// Jobs waiting to be claimed
    pub waiting: usize,
    /// Jobs currently executing
    pub active: usize,
    /// Jobs scheduled for the future
    pub delayed: usize,
    /// Jobs that finished successfully
    pub completed: usize,
    /// Jobs that failed permanently
    pub failed: usize,
}

impl PartitionCounts {
    /// Total number of jobs across all partitions.
    pub fn total(&self) -> usize {
        self.waiting + self.active + self.delayed + self.completed + self.failed
    }
}

/// Read model over the queue's store.
#[derive(Clone)]
pub struct Monitor {
    store: SharedStore,
}

impl Monitor {
    /// Create a monitor over a store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Count jobs in every partition.
    pub async fn counts(&self) -> RelayResult<PartitionCounts> {
        Ok(PartitionCounts {
            waiting: self.store.count(Partition::Waiting).await?,
            active: self.store.count(Partition::Active).await?,
            delayed: self.store.count(Partition::Delayed).await?,
            completed: self.store.count(Partition::Completed).await?,
            failed: self.store.count(Partition::Failed).await?,
        })
    }

    /// Up to `limit` job summaries in the given state, newest first.
    ///
    /// Typical use is surfacing recent failures together with their
    /// `last_error`.
    pub async fn sample(&self, state: JobState, limit: usize) -> RelayResult<Vec<JobSummary>> {
        let mut jobs = self.store.read_all(Partition::from(state)).await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(jobs.iter().take(limit).map(JobSummary::from).collect())
    }

    /// Age of the oldest job in `partition`, by creation time.
    ///
    /// `None` when the partition is empty. A growing waiting-age is the
    /// usual first sign that the worker pool is underprovisioned.
    pub async fn oldest_age(&self, partition: Partition) -> RelayResult<Option<Duration>> {
        let jobs = self.store.read_all(partition).await?;
        let oldest = jobs.iter().map(|job| job.created_at).min();

        Ok(oldest.map(|created_at| {
            SystemTime::now()
                .duration_since(created_at)
                .unwrap_or_default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::job::EnqueueOptions;
    use crate::queue::Queue;
    use crate::store::StoreFactory;
    use serde_json::json;

    fn setup() -> (Queue, Monitor) {
        let store = StoreFactory::in_memory();
        let monitor = Monitor::new(store.clone());
        (Queue::new(store, RetryPolicy::fixed(1, 100)), monitor)
    }

    #[tokio::test]
    async fn test_counts_track_lifecycle() {
        let (queue, monitor) = setup();

        let a = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue
            .enqueue(
                json!({}),
                EnqueueOptions::new().with_delay(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        let counts = monitor.counts().await.unwrap();
        assert_eq!(counts.waiting, 2);
        assert_eq!(counts.delayed, 1);
        assert_eq!(counts.total(), 3);

        queue.claim(Duration::from_secs(30)).await.unwrap().unwrap();
        queue.complete(&a).await.unwrap();

        let counts = monitor.counts().await.unwrap();
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.active, 0);
    }

    #[tokio::test]
    async fn test_sample_returns_failures_with_errors() {
        let (queue, monitor) = setup();

        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(Duration::from_secs(30)).await.unwrap().unwrap();
        queue.fail(&id, "smtp unreachable").await.unwrap();

        let failures = monitor.sample(JobState::Failed, 10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, id);
        assert_eq!(failures[0].last_error.as_deref(), Some("smtp unreachable"));
    }

    #[tokio::test]
    async fn test_sample_respects_limit() {
        let (queue, monitor) = setup();
        for n in 0..5 {
            queue.enqueue(json!({ "n": n }), EnqueueOptions::new()).await.unwrap();
        }

        let sampled = monitor.sample(JobState::Waiting, 3).await.unwrap();
        assert_eq!(sampled.len(), 3);
    }

    #[tokio::test]
    async fn test_oldest_age_empty_is_none() {
        let (_queue, monitor) = setup();
        assert!(monitor.oldest_age(Partition::Waiting).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oldest_age_grows() {
        let (queue, monitor) = setup();
        queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let age = monitor.oldest_age(Partition::Waiting).await.unwrap().unwrap();
        assert!(age >= Duration::from_millis(10));
    }
}
