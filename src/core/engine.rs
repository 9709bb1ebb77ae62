//! The RelayQ engine, which wires together the long-running components.
//!
//! The engine owns the worker pool, the scheduler and the health loop, and
//! is responsible for starting them in the right order and tearing them
//! down again on shutdown. Most applications use it through [`Relay`]
//! rather than directly.
//!
//! [`Relay`]: crate::core::Relay

use crate::config::RelayConfig;
use crate::core::scheduler::Scheduler;
use crate::core::worker::{WorkerPool, WorkerStats};
use crate::error::{RelayError, RelayResult};
use crate::job::JobHandler;
use crate::monitor::Monitor;
use crate::queue::Queue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Orchestrates the worker pool, scheduler and health monitoring.
pub struct RelayEngine {
    /// Configuration
    config: RelayConfig,
    /// The queue all components operate on
    queue: Arc<Queue>,
    /// Read-only view for health reporting
    monitor: Monitor,
    /// Worker pool processing claimed jobs
    worker_pool: Arc<WorkerPool>,
    /// Control flags
    is_running: Arc<AtomicBool>,
    is_shutting_down: Arc<AtomicBool>,
    /// Component handles
    scheduler_handle: Option<JoinHandle<()>>,
    health_handle: Option<JoinHandle<()>>,
    /// Engine start time for uptime tracking
    start_time: Option<Instant>,
}

impl RelayEngine {
    /// Create a new engine over a queue and handler.
    pub fn new(config: RelayConfig, queue: Arc<Queue>, handler: Arc<dyn JobHandler>) -> Self {
        let monitor = Monitor::new(queue.store().clone());
        let worker_pool = Arc::new(WorkerPool::new(
            Arc::clone(&queue),
            handler,
            config.clone(),
        ));

        Self {
            config,
            queue,
            monitor,
            worker_pool,
            is_running: Arc::new(AtomicBool::new(false)),
            is_shutting_down: Arc::new(AtomicBool::new(false)),
            scheduler_handle: None,
            health_handle: None,
            start_time: None,
        }
    }

    /// Start all engine components.
    ///
    /// Spawns the scheduler first so delayed promotion and lock reclaim are
    /// running before any worker claims a job, then the health loop, then
    /// the worker pool.
    pub async fn start(&mut self) -> RelayResult<()> {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(RelayError::AlreadyRunning);
        }

        tracing::info!(
            workers = self.config.workers.num_workers,
            tick_ms = self.config.scheduler.tick_ms,
            "starting engine"
        );

        self.is_shutting_down.store(false, Ordering::SeqCst);
        self.scheduler_handle = Some(self.start_scheduler());
        self.health_handle = Some(self.start_health_loop());
        self.worker_pool.spawn_workers().await;

        self.is_running.store(true, Ordering::SeqCst);
        self.start_time = Some(Instant::now());

        tracing::info!("engine started");
        Ok(())
    }

    fn start_scheduler(&self) -> JoinHandle<()> {
        let scheduler = Scheduler::new(
            Arc::clone(&self.queue),
            Duration::from_millis(self.config.scheduler.tick_ms),
            Arc::clone(&self.is_shutting_down),
        );

        tokio::spawn(async move {
            scheduler.run().await;
        })
    }

    fn start_health_loop(&self) -> JoinHandle<()> {
        let monitor = self.monitor.clone();
        let worker_pool = Arc::clone(&self.worker_pool);
        let expected_workers = self.config.workers.num_workers;
        let shutting_down = Arc::clone(&self.is_shutting_down);
        let period = Duration::from_secs(self.config.scheduler.health_check_interval_secs);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;

                if shutting_down.load(Ordering::Relaxed) {
                    break;
                }

                let stats = worker_pool.stats().await;
                let status = if stats.active_workers == expected_workers {
                    "HEALTHY"
                } else if stats.active_workers > 0 {
                    "DEGRADED"
                } else {
                    "CRITICAL"
                };

                match monitor.counts().await {
                    Ok(counts) => {
                        tracing::info!(
                            status,
                            active_workers = stats.active_workers,
                            expected_workers,
                            waiting = counts.waiting,
                            active = counts.active,
                            delayed = counts.delayed,
                            failed = counts.failed,
                            succeeded = stats.jobs_succeeded,
                            "health check"
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "health check could not read counts");
                    }
                }
            }
        })
    }

    /// Shut down all components gracefully.
    ///
    /// Workers are given `shutdown_timeout_secs` to finish their current
    /// job; the scheduler and health loop observe the shutdown flag and
    /// stop on their next tick.
    pub async fn shutdown(&self) -> RelayResult<()> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(RelayError::NotRunning);
        }

        tracing::info!("shutting down engine");
        self.is_shutting_down.store(true, Ordering::SeqCst);

        let grace = Duration::from_secs(self.config.workers.shutdown_timeout_secs.unwrap_or(30));
        self.worker_pool.shutdown(grace).await;

        if let Some(handle) = &self.scheduler_handle {
            handle.abort();
        }
        if let Some(handle) = &self.health_handle {
            handle.abort();
        }

        self.is_running.store(false, Ordering::SeqCst);
        tracing::info!("engine shut down");
        Ok(())
    }

    /// Block until ctrl-c, then shut down.
    pub async fn wait_for_shutdown(&self) -> RelayResult<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|err| RelayError::store("Failed to listen for shutdown signal", err))?;

        tracing::info!("shutdown signal received");
        self.shutdown().await
    }

    /// Check that the engine and its store are healthy.
    pub async fn health_check(&self) -> RelayResult<()> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(RelayError::NotRunning);
        }

        self.queue.store().health_check().await?;

        let active = self.worker_pool.active_worker_count();
        if active == 0 {
            return Err(RelayError::config("No active workers"));
        }
        if active < self.config.workers.num_workers / 2 {
            tracing::warn!(
                active,
                expected = self.config.workers.num_workers,
                "less than half of the worker pool is active"
            );
        }

        Ok(())
    }

    /// Current worker statistics.
    pub async fn worker_stats(&self) -> WorkerStats {
        self.worker_pool.stats().await
    }

    /// How long the engine has been running.
    pub fn uptime(&self) -> Option<Duration> {
        self.start_time.map(|started| started.elapsed())
    }

    /// Whether the engine is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Whether a shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::job::EnqueueOptions;
    use crate::store::StoreFactory;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::sleep;

    struct NoopHandler;

    #[async_trait]
    impl JobHandler for NoopHandler {
        async fn execute(&self, _payload: &serde_json::Value) -> RelayResult<()> {
            Ok(())
        }
    }

    fn test_engine() -> RelayEngine {
        let config = RelayConfig::testing();
        let queue = Arc::new(Queue::new(
            StoreFactory::in_memory(),
            config.queue.default_retry_policy.clone(),
        ));
        RelayEngine::new(config, queue, Arc::new(NoopHandler))
    }

    #[tokio::test]
    async fn test_engine_starts_stopped() {
        let engine = test_engine();
        assert!(!engine.is_running());
        assert!(!engine.is_shutting_down());
        assert!(engine.uptime().is_none());
    }

    #[tokio::test]
    async fn test_engine_lifecycle() {
        let mut engine = test_engine();

        engine.start().await.unwrap();
        assert!(engine.is_running());
        assert!(engine.uptime().is_some());

        // Give workers a moment to come up before the health check.
        sleep(Duration::from_millis(50)).await;
        engine.health_check().await.unwrap();

        engine.shutdown().await.unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let mut engine = test_engine();
        engine.start().await.unwrap();

        assert!(matches!(
            engine.start().await,
            Err(RelayError::AlreadyRunning)
        ));

        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_when_stopped_rejected() {
        let engine = test_engine();
        assert!(matches!(
            engine.shutdown().await,
            Err(RelayError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_engine_processes_jobs() {
        let config = RelayConfig::testing();
        let queue = Arc::new(Queue::new(
            StoreFactory::in_memory(),
            RetryPolicy::fixed(1, 100),
        ));
        let mut engine = RelayEngine::new(config, Arc::clone(&queue), Arc::new(NoopHandler));

        let id = queue
            .enqueue(json!({ "kind": "noop" }), EnqueueOptions::new())
            .await
            .unwrap();

        engine.start().await.unwrap();

        let mut completed = false;
        for _ in 0..100 {
            let job = queue.job(&id).await.unwrap().unwrap();
            if job.state == crate::job::JobState::Completed {
                completed = true;
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }

        engine.shutdown().await.unwrap();
        assert!(completed, "job was not processed before shutdown");
    }
}
