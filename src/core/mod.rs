//! The main Relay facade and engine.
//!
//! [`Relay`] is the primary entry point for RelayQ. It owns the queue, the
//! engine and the monitor, and provides a small API for enqueueing jobs and
//! controlling the processing lifecycle.

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::job::{EnqueueOptions, Job, JobHandler, JobId};
use crate::monitor::{Monitor, PartitionCounts};
use crate::queue::Queue;
use crate::store::{SharedStore, StoreFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

pub mod engine;
pub mod scheduler;
pub mod worker;

pub use engine::RelayEngine;
pub use scheduler::Scheduler;
pub use worker::{Worker, WorkerPool, WorkerStats};

/// The main RelayQ handle.
///
/// Enqueueing works whether or not processing has been started, so a web
/// process can share the store with a dedicated worker process and only
/// ever call [`Relay::enqueue`].
///
/// # Examples
///
/// ```rust,no_run
/// use relayq::prelude::*;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// struct EmailHandler;
///
/// #[async_trait::async_trait]
/// impl JobHandler for EmailHandler {
///     async fn execute(&self, payload: &serde_json::Value) -> RelayResult<()> {
///         println!("sending email: {payload}");
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> RelayResult<()> {
///     let relay = Relay::new(RelayConfig::default(), Arc::new(EmailHandler))?;
///     relay.enqueue(json!({ "to": "user@example.com" }), EnqueueOptions::new()).await?;
///     relay.start().await?;
///     relay.wait_for_shutdown().await
/// }
/// ```
pub struct Relay {
    engine: RwLock<Option<RelayEngine>>,
    queue: Arc<Queue>,
    monitor: Monitor,
    handler: Arc<dyn JobHandler>,
    config: RelayConfig,
    is_running: Arc<AtomicBool>,
}

impl Relay {
    /// Create a Relay backed by the in-memory store.
    pub fn new(config: RelayConfig, handler: Arc<dyn JobHandler>) -> RelayResult<Self> {
        Self::with_store(config, StoreFactory::in_memory(), handler)
    }

    /// Create a Relay over a custom store.
    pub fn with_store(
        config: RelayConfig,
        store: SharedStore,
        handler: Arc<dyn JobHandler>,
    ) -> RelayResult<Self> {
        if let Err(problems) = config.validate() {
            return Err(RelayError::config(problems.join("; ")));
        }

        let queue = Arc::new(Queue::new(
            store,
            config.queue.default_retry_policy.clone(),
        ));
        let monitor = Monitor::new(queue.store().clone());

        Ok(Self {
            engine: RwLock::new(None),
            queue,
            monitor,
            handler,
            config,
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Enqueue a job for processing.
    ///
    /// Returns the id of the stored job. With a delay in `options` the job
    /// starts out delayed and becomes claimable once the delay elapses.
    pub async fn enqueue(
        &self,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> RelayResult<JobId> {
        self.queue.enqueue(payload, options).await
    }

    /// Look up a job by id, in any state.
    pub async fn job(&self, id: &JobId) -> RelayResult<Option<Job>> {
        self.queue.job(id).await
    }

    /// Job counts per partition.
    pub async fn counts(&self) -> RelayResult<PartitionCounts> {
        self.monitor.counts().await
    }

    /// The read-only monitor over this relay's store.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Start processing: spawn the worker pool and the scheduler.
    ///
    /// Returns immediately; use [`Relay::wait_for_shutdown`] to block.
    pub async fn start(&self) -> RelayResult<()> {
        let mut engine_guard = self.engine.write().await;
        if engine_guard.is_some() {
            return Err(RelayError::AlreadyRunning);
        }

        let mut engine = RelayEngine::new(
            self.config.clone(),
            Arc::clone(&self.queue),
            Arc::clone(&self.handler),
        );
        engine.start().await?;

        *engine_guard = Some(engine);
        self.is_running.store(true, Ordering::SeqCst);

        tracing::info!(
            workers = self.config.workers.num_workers,
            "relay started"
        );
        Ok(())
    }

    /// Stop processing and wait for workers to finish their current jobs.
    pub async fn shutdown(&self) -> RelayResult<()> {
        let mut engine_guard = self.engine.write().await;
        let Some(engine) = engine_guard.take() else {
            return Err(RelayError::NotRunning);
        };

        engine.shutdown().await?;
        self.is_running.store(false, Ordering::SeqCst);

        tracing::info!("relay stopped");
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

    /// Worker statistics, when processing is running.
    pub async fn worker_stats(&self) -> Option<WorkerStats> {
        let engine_guard = self.engine.read().await;
        match engine_guard.as_ref() {
            Some(engine) => Some(engine.worker_stats().await),
            None => None,
        }
    }

    /// Whether processing is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Check the health of the store and, when running, the engine.
    pub async fn health_check(&self) -> RelayResult<()> {
        self.queue.store().health_check().await?;

        let engine_guard = self.engine.read().await;
        if let Some(engine) = engine_guard.as_ref() {
            engine.health_check().await?;
        }

        Ok(())
    }

    /// The configuration this relay was built with.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        // Drop cannot await, so a still-running relay only gets a warning.
        // Call shutdown() explicitly for a graceful stop.
        if self.is_running.load(Ordering::SeqCst) {
            tracing::warn!("relay dropped while still running");
        }
    }
}
