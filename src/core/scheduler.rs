//! Periodic queue maintenance.
//!
//! The scheduler is the clock of the queue: on every tick it promotes
//! delayed jobs whose time has come and reclaims active jobs whose
//! visibility lock expired. Both operations are single-winner atomic
//! moves, so running several scheduler instances against the same store
//! is safe.

use crate::queue::Queue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::interval;

/// Runs promotion and reclaim on a fixed interval.
pub struct Scheduler {
    queue: Arc<Queue>,
    tick: Duration,
    shutting_down: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create a scheduler ticking every `tick`.
    pub fn new(queue: Arc<Queue>, tick: Duration, shutting_down: Arc<AtomicBool>) -> Self {
        Self {
            queue,
            tick,
            shutting_down,
        }
    }

    /// Run the maintenance loop until shutdown is requested.
    pub async fn run(&self) {
        tracing::info!(tick = ?self.tick, "scheduler started");

        let mut ticker = interval(self.tick);
        loop {
            ticker.tick().await;

            if self.shutting_down.load(Ordering::Relaxed) {
                break;
            }

            self.tick_once().await;
        }

        tracing::info!("scheduler stopped");
    }

    /// One maintenance pass: promote due delayed jobs, then reclaim
    /// expired locks. Errors are logged and the loop carries on; a
    /// transient store failure just delays maintenance to the next tick.
    pub async fn tick_once(&self) {
        match self.queue.promote_delayed().await {
            Ok(promoted) if promoted > 0 => {
                tracing::debug!(promoted, "promoted delayed jobs");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "delayed promotion failed");
            }
        }

        match self.queue.reclaim_expired().await {
            Ok(reclaimed) if reclaimed > 0 => {
                tracing::info!(reclaimed, "reclaimed jobs with expired locks");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "lock reclaim failed");
            }
        }
    }
}
