//! The job state machine.
//!
//! `Queue` is the only component that moves jobs between partitions. Every
//! transition is expressed as a single atomic store move, so the queue
//! stays correct with any number of workers, schedulers or producers
//! running concurrently against the same store.
//!
//! Lifecycle:
//!
//! ```text
//! enqueue ──> Waiting ──claim──> Active ──complete──> Completed
//!    │          ^                  │ │
//!    │          │                  │ └──fail (budget left)──> Waiting
//!    └──> Delayed ──promote──┘     └──fail (exhausted)─────> Failed
//!               (reclaim: Active ──> Waiting, lock expired)
//! ```

use crate::config::RetryPolicy;
use crate::error::{RelayError, RelayResult};
use crate::job::{EnqueueOptions, Job, JobId, JobState};
use crate::store::{Partition, SharedStore};
use crate::utils::retry_delay;
use std::time::{Duration, SystemTime};

/// Owns every partition transition for a single logical queue.
pub struct Queue {
    store: SharedStore,
    retry_policy: RetryPolicy,
}

impl Queue {
    /// Create a queue over a store with the given retry policy.
    pub fn new(store: SharedStore, retry_policy: RetryPolicy) -> Self {
        Self {
            store,
            retry_policy,
        }
    }

    /// The store this queue runs against.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Accept a new job.
    ///
    /// The job lands in `Waiting`, or in `Delayed` when the options carry a
    /// delay, and becomes claimable at its `available_at` time. Fails only
    /// when the store is unavailable.
    pub async fn enqueue(
        &self,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> RelayResult<JobId> {
        let job = Job::new(payload, &options, self.retry_policy.max_attempts);
        let partition = Partition::from(job.state);
        let delay = options.delay.unwrap_or(Duration::ZERO);

        let id = self.store.append(partition, job).await?;

        tracing::debug!(job_id = %id, partition = %partition, ?delay, "job enqueued");
        Ok(id)
    }

    /// Claim the next available job for execution.
    ///
    /// Atomically takes the first `Waiting` job whose `available_at` has
    /// passed, increments its attempt counter and locks it until
    /// `now + lock_duration`. Returns `None` when nothing is claimable,
    /// which is not an error. Under concurrent callers each job is handed
    /// out exactly once.
    pub async fn claim(&self, lock_duration: Duration) -> RelayResult<Option<Job>> {
        let now = SystemTime::now();

        let claimed = self
            .store
            .move_first(
                Partition::Waiting,
                Partition::Active,
                &move |job: &Job| job.is_available(now),
                &move |job: &mut Job| {
                    job.state = JobState::Active;
                    job.attempts += 1;
                    job.locked_until = Some(now + lock_duration);
                },
            )
            .await?;

        if let Some(job) = &claimed {
            tracing::debug!(
                job_id = %job.id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                "job claimed"
            );
        }

        Ok(claimed)
    }

    /// Mark an active job as successfully finished.
    ///
    /// Returns `Err(NotFound)` when the job is not currently `Active`, for
    /// example because its lock expired and the reaper already took it
    /// back. Callers that lost the race treat this as a benign no-op.
    pub async fn complete(&self, id: &JobId) -> RelayResult<()> {
        let moved = self
            .store
            .move_job(id, Partition::Active, Partition::Completed, &|job| {
                job.state = JobState::Completed;
                job.locked_until = None;
            })
            .await?;

        match moved {
            Some(job) => {
                tracing::debug!(job_id = %job.id, attempts = job.attempts, "job completed");
                Ok(())
            }
            None => Err(RelayError::not_found(id.clone())),
        }
    }

    /// Record a failed execution for an active job.
    ///
    /// While budget remains the job goes back to `Waiting` with a backoff
    /// delay; once `attempts` reaches `max_attempts` it lands terminally in
    /// `Failed`. Either way `last_error` keeps the message. Returns
    /// `Err(NotFound)` when the job is not currently `Active`.
    pub async fn fail(&self, id: &JobId, error: &str) -> RelayResult<()> {
        // attempts only changes on claim, which requires Waiting membership,
        // so the snapshot holds for as long as the job stays Active.
        let Some(snapshot) = self.store.get(id).await? else {
            return Err(RelayError::not_found(id.clone()));
        };

        let now = SystemTime::now();
        let message = error.to_string();

        if snapshot.attempts < snapshot.max_attempts {
            let delay = retry_delay(&self.retry_policy, snapshot.attempts);
            let moved = self
                .store
                .move_job(id, Partition::Active, Partition::Waiting, &move |job| {
                    job.state = JobState::Waiting;
                    job.locked_until = None;
                    job.available_at = now + delay;
                    job.last_error = Some(message.clone());
                })
                .await?;

            match moved {
                Some(job) => {
                    tracing::warn!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        max_attempts = job.max_attempts,
                        retry_in = ?delay,
                        error,
                        "job failed, retry scheduled"
                    );
                    Ok(())
                }
                None => Err(RelayError::not_found(id.clone())),
            }
        } else {
            let moved = self
                .store
                .move_job(id, Partition::Active, Partition::Failed, &move |job| {
                    job.state = JobState::Failed;
                    job.locked_until = None;
                    job.last_error = Some(message.clone());
                })
                .await?;

            match moved {
                Some(job) => {
                    tracing::error!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        error,
                        "job failed permanently"
                    );
                    Ok(())
                }
                None => Err(RelayError::not_found(id.clone())),
            }
        }
    }

    /// Hand back active jobs whose visibility lock has expired.
    ///
    /// Each expired job returns to `Waiting`, immediately claimable, with
    /// its lock cleared. The attempt counter is left untouched: a worker
    /// crash or timeout should not burn the job's retry budget. A job that
    /// expired on its final allowed execution has no budget left to run
    /// again and lands terminally in `Failed` instead. Returns how many
    /// jobs were taken out of `Active`.
    pub async fn reclaim_expired(&self) -> RelayResult<usize> {
        let now = SystemTime::now();
        let mut reclaimed = 0;

        while let Some(job) = self
            .store
            .move_first(
                Partition::Active,
                Partition::Waiting,
                &move |job: &Job| job.lock_expired(now) && !job.attempts_exhausted(),
                &move |job: &mut Job| {
                    job.state = JobState::Waiting;
                    job.locked_until = None;
                    job.available_at = now;
                },
            )
            .await?
        {
            tracing::warn!(
                job_id = %job.id,
                attempts = job.attempts,
                "lock expired, job reclaimed"
            );
            reclaimed += 1;
        }

        while let Some(job) = self
            .store
            .move_first(
                Partition::Active,
                Partition::Failed,
                &move |job: &Job| job.lock_expired(now),
                &|job: &mut Job| {
                    job.state = JobState::Failed;
                    job.locked_until = None;
                    job.last_error =
                        Some("visibility lock expired with no attempts remaining".to_string());
                },
            )
            .await?
        {
            tracing::error!(
                job_id = %job.id,
                attempts = job.attempts,
                "lock expired on final attempt, job failed permanently"
            );
            reclaimed += 1;
        }

        Ok(reclaimed)
    }

    /// Move delayed jobs whose time has come into `Waiting`.
    ///
    /// Returns how many jobs were promoted.
    pub async fn promote_delayed(&self) -> RelayResult<usize> {
        let now = SystemTime::now();
        let mut promoted = 0;

        while let Some(job) = self
            .store
            .move_first(
                Partition::Delayed,
                Partition::Waiting,
                &move |job: &Job| job.is_available(now),
                &|job: &mut Job| {
                    job.state = JobState::Waiting;
                },
            )
            .await?
        {
            tracing::debug!(job_id = %job.id, "delayed job promoted");
            promoted += 1;
        }

        Ok(promoted)
    }

    /// Fetch a job record by id, wherever it lives.
    pub async fn job(&self, id: &JobId) -> RelayResult<Option<Job>> {
        Ok(self.store.get(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreFactory;
    use serde_json::json;

    const LOCK: Duration = Duration::from_secs(30);

    fn queue_with(policy: RetryPolicy) -> Queue {
        Queue::new(StoreFactory::in_memory(), policy)
    }

    fn queue() -> Queue {
        queue_with(RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_enqueue_lands_in_waiting() {
        let queue = queue();
        let id = queue
            .enqueue(json!({"email": "user@example.com"}), EnqueueOptions::new())
            .await
            .unwrap();

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 0);
        assert_eq!(queue.store().count(Partition::Waiting).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_with_delay_lands_in_delayed() {
        let queue = queue();
        let options = EnqueueOptions::new().with_delay(Duration::from_secs(60));
        let id = queue.enqueue(json!({}), options).await.unwrap();

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Delayed);
        assert_eq!(queue.store().count(Partition::Delayed).await.unwrap(), 1);
        assert_eq!(queue.store().count(Partition::Waiting).await.unwrap(), 0);

        // Not claimable while delayed.
        assert!(queue.claim(LOCK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_increments_attempts_and_locks() {
        let queue = queue();
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();

        let job = queue.claim(LOCK).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.attempts, 1);
        assert!(job.locked_until.is_some());

        // Nothing else to claim.
        assert!(queue.claim(LOCK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_empty_queue_is_none() {
        let queue = queue();
        assert!(queue.claim(LOCK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_fifo() {
        let queue = queue();
        let first = queue.enqueue(json!({"n": 1}), EnqueueOptions::new()).await.unwrap();
        let second = queue.enqueue(json!({"n": 2}), EnqueueOptions::new()).await.unwrap();

        assert_eq!(queue.claim(LOCK).await.unwrap().unwrap().id, first);
        assert_eq!(queue.claim(LOCK).await.unwrap().unwrap().id, second);
    }

    #[tokio::test]
    async fn test_complete_moves_to_completed() {
        let queue = queue();
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(LOCK).await.unwrap().unwrap();

        queue.complete(&id).await.unwrap();

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert!(job.locked_until.is_none());
        assert_eq!(queue.store().count(Partition::Completed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_double_complete_is_not_found() {
        let queue = queue();
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(LOCK).await.unwrap().unwrap();

        queue.complete(&id).await.unwrap();
        let err = queue.complete(&id).await.unwrap_err();
        assert!(err.is_not_found());

        // First completion stands.
        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_complete_unclaimed_is_not_found() {
        let queue = queue();
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();

        let err = queue.complete(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fail_with_budget_schedules_retry() {
        let queue = queue_with(RetryPolicy::exponential(3));
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(LOCK).await.unwrap().unwrap();

        let before = SystemTime::now();
        queue.fail(&id, "smtp unreachable").await.unwrap();

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 1);
        assert!(job.locked_until.is_none());
        assert_eq!(job.last_error.as_deref(), Some("smtp unreachable"));
        assert!(job.available_at > before);

        // Backoff pushed availability into the future, so claim skips it.
        assert!(queue.claim(LOCK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_exhausted_budget_is_terminal() {
        let queue = queue_with(RetryPolicy::fixed(1, 100));
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(LOCK).await.unwrap().unwrap();

        queue.fail(&id, "boom").await.unwrap();

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
        assert_eq!(queue.store().count(Partition::Failed).await.unwrap(), 1);

        // Terminal jobs are never claimable again.
        assert!(queue.claim(LOCK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_unknown_job_is_not_found() {
        let queue = queue();
        let err = queue.fail(&"missing".to_string(), "boom").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reclaim_expired_returns_job_without_burning_attempts() {
        let queue = queue();
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();

        // Claim with an already-expired lock to simulate a crashed worker.
        let claimed = queue.claim(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(claimed.attempts, 1);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let reclaimed = queue.reclaim_expired().await.unwrap();
        assert_eq!(reclaimed, 1);

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 1);
        assert!(job.locked_until.is_none());

        // And it is claimable again.
        let again = queue.claim(LOCK).await.unwrap().unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn test_reclaim_on_final_attempt_is_terminal() {
        let queue = queue_with(RetryPolicy::none());
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();

        // The only allowed execution crashes (lock expires, no settle).
        queue.claim(Duration::ZERO).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(queue.reclaim_expired().await.unwrap(), 1);

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 1);
        assert!(job.last_error.is_some());

        // Never claimable again, so attempts can't pass max_attempts.
        assert!(queue.claim(LOCK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reclaim_leaves_live_locks_alone() {
        let queue = queue();
        queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(Duration::from_secs(300)).await.unwrap().unwrap();

        assert_eq!(queue.reclaim_expired().await.unwrap(), 0);
        assert_eq!(queue.store().count(Partition::Active).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_complete_after_reclaim_is_not_found() {
        let queue = queue();
        let id = queue.enqueue(json!({}), EnqueueOptions::new()).await.unwrap();
        queue.claim(Duration::ZERO).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(queue.reclaim_expired().await.unwrap(), 1);

        // The original worker coming back late loses gracefully.
        let err = queue.complete(&id).await.unwrap_err();
        assert!(err.is_not_found());

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
    }

    #[tokio::test]
    async fn test_promote_delayed_moves_due_jobs() {
        let queue = queue();
        let due = queue
            .enqueue(
                json!({}),
                EnqueueOptions::new().with_delay(Duration::from_millis(1)),
            )
            .await
            .unwrap();
        queue
            .enqueue(
                json!({}),
                EnqueueOptions::new().with_delay(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let promoted = queue.promote_delayed().await.unwrap();
        assert_eq!(promoted, 1);

        let job = queue.job(&due).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(queue.store().count(Partition::Delayed).await.unwrap(), 1);
        assert_eq!(queue.store().count(Partition::Waiting).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_max_attempts_override_applies() {
        let queue = queue_with(RetryPolicy::fixed(5, 100));
        let id = queue
            .enqueue(json!({}), EnqueueOptions::new().with_max_attempts(1))
            .await
            .unwrap();

        queue.claim(LOCK).await.unwrap().unwrap();
        queue.fail(&id, "boom").await.unwrap();

        let job = queue.job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
    }
}
