//! Job definition, lifecycle states and the handler trait.

use crate::error::RelayResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Unique identifier for a job
pub type JobId = String;

/// Lifecycle state of a job in the queue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Job is eligible for claiming by a worker
    Waiting,
    /// Job is claimed by a worker and executing
    Active,
    /// Job is scheduled for a future point in time
    Delayed,
    /// Job finished successfully
    Completed,
    /// Job failed permanently (retry budget exhausted)
    Failed,
}

impl JobState {
    /// Stable lowercase name, used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Whether the state is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of deferred work tracked by the queue.
///
/// The record is the durable representation of a job: an opaque JSON
/// payload plus the bookkeeping the queue needs for retries, delayed
/// execution and visibility timeouts. `id`, `payload`, `created_at` and
/// `max_attempts` never change after creation; everything else is owned
/// by the queue's state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (uuid v4)
    pub id: JobId,
    /// Opaque caller-defined payload
    pub payload: serde_json::Value,
    /// Current lifecycle state
    pub state: JobState,
    /// Number of executions started so far
    pub attempts: u32,
    /// Maximum number of executions allowed
    pub max_attempts: u32,
    /// When the job was created
    pub created_at: SystemTime,
    /// When the job becomes claimable
    pub available_at: SystemTime,
    /// Visibility deadline while the job is active
    pub locked_until: Option<SystemTime>,
    /// Error message from the most recent failed execution
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new job from a payload and enqueue options.
    ///
    /// The job starts in `Waiting`, or in `Delayed` when the options carry
    /// a delay, with `available_at` pushed into the future accordingly.
    pub fn new(payload: serde_json::Value, options: &EnqueueOptions, default_max_attempts: u32) -> Self {
        let now = SystemTime::now();
        let delay = options.delay.unwrap_or(Duration::ZERO);
        let state = if delay.is_zero() {
            JobState::Waiting
        } else {
            JobState::Delayed
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            state,
            attempts: 0,
            max_attempts: options.max_attempts.unwrap_or(default_max_attempts),
            created_at: now,
            available_at: now + delay,
            locked_until: None,
            last_error: None,
        }
    }

    /// Whether the job is claimable at `now`
    pub fn is_available(&self, now: SystemTime) -> bool {
        self.available_at <= now
    }

    /// Whether the job's visibility lock has expired at `now`
    pub fn lock_expired(&self, now: SystemTime) -> bool {
        match self.locked_until {
            Some(deadline) => deadline < now,
            None => false,
        }
    }

    /// Whether the retry budget is exhausted
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Options accepted at enqueue time.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Delay before the job becomes claimable
    pub delay: Option<Duration>,
    /// Per-job override of the maximum execution count
    pub max_attempts: Option<u32>,
}

impl EnqueueOptions {
    /// Options with no delay and the configured default retry budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay before the job becomes claimable
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Override the maximum number of executions for this job
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Operator-facing projection of a job, returned by monitoring queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    /// Unique job identifier
    pub id: JobId,
    /// Current lifecycle state
    pub state: JobState,
    /// Number of executions started so far
    pub attempts: u32,
    /// Maximum number of executions allowed
    pub max_attempts: u32,
    /// When the job was created
    pub created_at: SystemTime,
    /// When the job becomes claimable
    pub available_at: SystemTime,
    /// Error message from the most recent failed execution
    pub last_error: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            state: job.state,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            created_at: job.created_at,
            available_at: job.available_at,
            last_error: job.last_error.clone(),
        }
    }
}

/// Trait implemented by the application to process job payloads.
///
/// The queue guarantees at-least-once delivery, so the same payload can be
/// handed to the handler more than once (worker crash, visibility timeout).
/// Implementations must be idempotent or tolerate duplicates.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute one job payload.
    ///
    /// Returning `Err` marks the execution as failed and the queue retries
    /// the job with backoff until its retry budget runs out.
    async fn execute(&self, payload: &serde_json::Value) -> RelayResult<()>;
}
