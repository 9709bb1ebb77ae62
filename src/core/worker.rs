//! Worker implementation for RelayQ.
//!
//! Each worker is an independent tokio task looping claim, execute,
//! settle. Workers coordinate only through the queue's atomic claim, so
//! there is no dispatcher between them and the store.

use crate::config::RelayConfig;
use crate::job::{Job, JobHandler};
use crate::queue::Queue;
use crate::utils::poll_backoff;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Outcome of one handler execution
#[derive(Debug, Clone, PartialEq, Eq)]
enum ExecutionOutcome {
    /// Handler returned Ok
    Success,
    /// Handler returned an error or panicked
    Failed(String),
    /// Handler ran past its deadline
    TimedOut,
}

/// Statistics about worker activity
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Number of currently running workers
    pub active_workers: usize,
    /// Jobs completed successfully
    pub jobs_succeeded: u64,
    /// Job executions that failed and were handed back for retry or burial
    pub jobs_failed: u64,
    /// Jobs abandoned on timeout, left for the reaper to recover
    pub jobs_abandoned: u64,
}

/// Individual worker that claims and executes jobs
pub struct Worker {
    id: usize,
    queue: Arc<Queue>,
    handler: Arc<dyn JobHandler>,
    config: RelayConfig,
    stats: Arc<Mutex<WorkerStats>>,
    shutting_down: Arc<AtomicBool>,
}

impl Worker {
    /// Create a new worker with the given ID
    pub fn new(
        id: usize,
        queue: Arc<Queue>,
        handler: Arc<dyn JobHandler>,
        config: RelayConfig,
        stats: Arc<Mutex<WorkerStats>>,
        shutting_down: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            queue,
            handler,
            config,
            stats,
            shutting_down,
        }
    }

    /// Run the worker loop until shutdown is requested.
    pub async fn run(&self) {
        tracing::info!(worker_id = self.id, "worker started");

        let base = Duration::from_millis(self.config.workers.poll_backoff_base_ms);
        let max = Duration::from_millis(self.config.workers.poll_backoff_max_ms);
        let mut unproductive_polls = 0u32;

        while !self.shutting_down.load(Ordering::Relaxed) {
            match self.queue.claim(self.config.lock_duration()).await {
                Ok(Some(job)) => {
                    unproductive_polls = 0;
                    self.process(job).await;
                }
                Ok(None) => {
                    unproductive_polls += 1;
                    sleep(poll_backoff(unproductive_polls, base, max)).await;
                }
                Err(err) => {
                    unproductive_polls += 1;
                    tracing::error!(worker_id = self.id, error = %err, "claim failed");
                    sleep(poll_backoff(unproductive_polls, base, max)).await;
                }
            }
        }

        tracing::info!(worker_id = self.id, "worker stopped");
    }

    /// Execute one claimed job and settle it with the queue.
    async fn process(&self, job: Job) {
        let job_id = job.id.clone();
        tracing::debug!(worker_id = self.id, job_id = %job_id, "executing job");

        let start = std::time::Instant::now();
        let outcome = self.execute(job).await;
        let elapsed = start.elapsed();

        match outcome {
            ExecutionOutcome::Success => {
                match self.queue.complete(&job_id).await {
                    Ok(()) => {
                        self.stats.lock().await.jobs_succeeded += 1;
                        tracing::info!(
                            worker_id = self.id,
                            job_id = %job_id,
                            ?elapsed,
                            "job succeeded"
                        );
                    }
                    Err(err) if err.is_not_found() => {
                        // Lock expired mid-flight and the reaper won the race.
                        tracing::debug!(
                            worker_id = self.id,
                            job_id = %job_id,
                            "job already settled, completion dropped"
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            worker_id = self.id,
                            job_id = %job_id,
                            error = %err,
                            "failed to record completion"
                        );
                    }
                }
            }
            ExecutionOutcome::Failed(message) => {
                self.stats.lock().await.jobs_failed += 1;
                match self.queue.fail(&job_id, &message).await {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {
                        tracing::debug!(
                            worker_id = self.id,
                            job_id = %job_id,
                            "job already settled, failure dropped"
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            worker_id = self.id,
                            job_id = %job_id,
                            error = %err,
                            "failed to record failure"
                        );
                    }
                }
            }
            ExecutionOutcome::TimedOut => {
                // No complete/fail: the job stays Active until its lock
                // expires and the reaper hands it to another worker.
                self.stats.lock().await.jobs_abandoned += 1;
                tracing::warn!(
                    worker_id = self.id,
                    job_id = %job_id,
                    ?elapsed,
                    "handler timed out, job abandoned for reclaim"
                );
            }
        }
    }

    /// Run the handler with a deadline.
    ///
    /// The deadline is the configured job timeout bounded above by the lock
    /// duration, so a worker never keeps executing a job it no longer owns.
    async fn execute(&self, job: Job) -> ExecutionOutcome {
        let lock_duration = self.config.lock_duration();
        let deadline = self
            .config
            .workers
            .job_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(lock_duration)
            .min(lock_duration);

        let handler = Arc::clone(&self.handler);
        let payload = job.payload.clone();
        let mut handle = tokio::spawn(async move { handler.execute(&payload).await });

        match timeout(deadline, &mut handle).await {
            Ok(Ok(Ok(()))) => ExecutionOutcome::Success,
            Ok(Ok(Err(err))) => ExecutionOutcome::Failed(err.to_string()),
            Ok(Err(join_error)) => ExecutionOutcome::Failed(format!(
                "handler panicked: {join_error}"
            )),
            Err(_) => {
                handle.abort();
                ExecutionOutcome::TimedOut
            }
        }
    }
}

/// Manages the pool of worker tasks
pub struct WorkerPool {
    queue: Arc<Queue>,
    handler: Arc<dyn JobHandler>,
    config: RelayConfig,
    stats: Arc<Mutex<WorkerStats>>,
    active_workers: Arc<AtomicUsize>,
    shutting_down: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool. Workers are not spawned until
    /// [`WorkerPool::spawn_workers`] is called.
    pub fn new(queue: Arc<Queue>, handler: Arc<dyn JobHandler>, config: RelayConfig) -> Self {
        Self {
            queue,
            handler,
            config,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
            active_workers: Arc::new(AtomicUsize::new(0)),
            shutting_down: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the configured number of workers.
    pub async fn spawn_workers(&self) {
        let count = self.config.workers.num_workers;
        tracing::info!(workers = count, "spawning worker pool");

        for worker_id in 0..count {
            self.spawn_worker(worker_id).await;
        }
    }

    async fn spawn_worker(&self, worker_id: usize) {
        let worker = Worker::new(
            worker_id,
            Arc::clone(&self.queue),
            Arc::clone(&self.handler),
            self.config.clone(),
            Arc::clone(&self.stats),
            Arc::clone(&self.shutting_down),
        );
        let active_workers = Arc::clone(&self.active_workers);

        let handle = tokio::spawn(async move {
            active_workers.fetch_add(1, Ordering::Relaxed);
            worker.run().await;
            active_workers.fetch_sub(1, Ordering::Relaxed);
        });

        self.handles.lock().await.push(handle);
        tracing::debug!(worker_id, "spawned worker");
    }

    /// Current worker statistics.
    pub async fn stats(&self) -> WorkerStats {
        let mut stats = self.stats.lock().await.clone();
        stats.active_workers = self.active_workers.load(Ordering::Relaxed);
        stats
    }

    /// Number of workers currently running.
    pub fn active_worker_count(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    /// Signal all workers to stop and wait for them to drain.
    ///
    /// Workers finish the job they are executing before exiting. Workers
    /// still running after `timeout_duration` are aborted.
    pub async fn shutdown(&self, timeout_duration: Duration) {
        self.shutting_down.store(true, Ordering::Relaxed);

        let mut handles = {
            let mut guard = self.handles.lock().await;
            std::mem::take(&mut *guard)
        };

        if handles.is_empty() {
            return;
        }

        tracing::info!(
            workers = handles.len(),
            ?timeout_duration,
            "shutting down worker pool"
        );

        if timeout(timeout_duration, futures::future::join_all(handles.iter_mut()))
            .await
            .is_err()
        {
            for handle in &handles {
                handle.abort();
            }
            tracing::warn!("worker pool shutdown timed out, aborted remaining workers");
        } else {
            tracing::info!("worker pool shut down cleanly");
        }
    }
}
