//! Configuration types for RelayQ.
//!
//! This module contains all configuration structures used throughout RelayQ,
//! including worker settings, queue behavior and scheduler cadence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for RelayQ.
///
/// # Examples
///
/// ```rust
/// use relayq::config::{RelayConfig, WorkerConfig};
///
/// // Use default configuration
/// let config = RelayConfig::default();
///
/// // Custom configuration
/// let config = RelayConfig {
///     workers: WorkerConfig {
///         num_workers: 8,
///         job_timeout_secs: Some(600),
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Worker pool configuration
    pub workers: WorkerConfig,

    /// Queue behavior configuration
    pub queue: QueueConfig,

    /// Scheduler and health loop cadence
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers to spawn
    pub num_workers: usize,

    /// Maximum time a handler can run before the worker abandons the job (in seconds)
    pub job_timeout_secs: Option<u64>,

    /// Time to wait for workers to shutdown gracefully (in seconds)
    pub shutdown_timeout_secs: Option<u64>,

    /// Base delay between polls when the queue is empty (in milliseconds)
    pub poll_backoff_base_ms: u64,

    /// Upper bound on the poll backoff (in milliseconds)
    pub poll_backoff_max_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get().max(1),
            job_timeout_secs: Some(300),     // 5 minutes
            shutdown_timeout_secs: Some(30), // 30 seconds
            poll_backoff_base_ms: 50,
            poll_backoff_max_ms: 5000,
        }
    }
}

impl WorkerConfig {
    /// Create a new worker configuration with a specific number of workers.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Set the per-job execution timeout.
    pub fn with_job_timeout(mut self, timeout_secs: u64) -> Self {
        self.job_timeout_secs = Some(timeout_secs);
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout_secs: u64) -> Self {
        self.shutdown_timeout_secs = Some(timeout_secs);
        self
    }
}

/// Queue behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Visibility timeout - how long a claimed job stays locked before the
    /// reaper may hand it back to another worker (in seconds)
    pub lock_duration_secs: u64,

    /// Default retry policy for failed jobs
    pub default_retry_policy: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lock_duration_secs: 300, // 5 minutes
            default_retry_policy: RetryPolicy::default(),
        }
    }
}

impl QueueConfig {
    /// Set the visibility timeout.
    pub fn with_lock_duration(mut self, secs: u64) -> Self {
        self.lock_duration_secs = secs;
        self
    }

    /// Set the default retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_retry_policy = policy;
        self
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of executions per job (first run included)
    pub max_attempts: u32,

    /// Base delay between retries (in milliseconds)
    pub base_delay_ms: u64,

    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,

    /// Backoff strategy
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000, // 1 second
            max_delay_ms: 60000, // 1 minute
            backoff_strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with exponential backoff.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_strategy: BackoffStrategy::Exponential { multiplier: 2.0 },
            ..Default::default()
        }
    }

    /// Create a retry policy with linear backoff.
    pub fn linear(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_strategy: BackoffStrategy::Linear { increment_ms: 1000 },
            ..Default::default()
        }
    }

    /// Create a retry policy with fixed delays.
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_strategy: BackoffStrategy::Fixed,
        }
    }

    /// Single execution, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,

    /// Linear backoff (base + attempt * increment)
    Linear {
        /// Increment per attempt (in milliseconds)
        increment_ms: u64,
    },

    /// Exponential backoff (base * multiplier^attempt)
    Exponential {
        /// Multiplier for exponential growth
        multiplier: f64,
    },
}

/// Scheduler and health loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between scheduler ticks - each tick promotes due delayed
    /// jobs and reclaims expired locks (in milliseconds)
    pub tick_ms: u64,

    /// Health log interval (in seconds)
    pub health_check_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            health_check_interval_secs: 30,
        }
    }
}

impl SchedulerConfig {
    /// Set the scheduler tick interval.
    pub fn with_tick(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: LogLevel,

    /// Enable structured JSON logging
    pub json_format: bool,

    /// Enable colored output (ignored if json_format is true)
    pub colored: bool,

    /// Include timestamps in logs
    pub include_timestamps: bool,

    /// Include target module in logs
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            colored: true,
            include_timestamps: true,
            include_targets: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl RelayConfig {
    /// Create a new configuration optimized for development.
    pub fn development() -> Self {
        Self {
            workers: WorkerConfig {
                num_workers: 2,
                job_timeout_secs: Some(60),
                ..Default::default()
            },
            queue: QueueConfig {
                lock_duration_secs: 60,
                ..Default::default()
            },
            scheduler: SchedulerConfig {
                tick_ms: 500,
                health_check_interval_secs: 10,
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: true,
                include_targets: true,
                ..Default::default()
            },
        }
    }

    /// Create a new configuration optimized for production.
    pub fn production() -> Self {
        Self {
            workers: WorkerConfig {
                num_workers: num_cpus::get() * 2,
                job_timeout_secs: Some(300),
                shutdown_timeout_secs: Some(60),
                ..Default::default()
            },
            queue: QueueConfig {
                lock_duration_secs: 600, // 10 minutes
                default_retry_policy: RetryPolicy::exponential(5),
            },
            scheduler: SchedulerConfig {
                tick_ms: 1000,
                health_check_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: LogLevel::Info,
                json_format: true,
                colored: false,
                include_timestamps: true,
                include_targets: false,
            },
        }
    }

    /// Create a configuration for testing.
    pub fn testing() -> Self {
        Self {
            workers: WorkerConfig {
                num_workers: 1,
                job_timeout_secs: Some(10),
                shutdown_timeout_secs: Some(5),
                poll_backoff_base_ms: 10,
                poll_backoff_max_ms: 100,
            },
            queue: QueueConfig {
                lock_duration_secs: 10,
                default_retry_policy: RetryPolicy::fixed(1, 100),
            },
            scheduler: SchedulerConfig {
                tick_ms: 50,
                health_check_interval_secs: 1,
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: false,
                include_timestamps: false,
                include_targets: true,
                ..Default::default()
            },
        }
    }

    /// Visibility timeout as a `Duration`.
    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.queue.lock_duration_secs)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.workers.num_workers == 0 {
            errors.push("Number of workers must be greater than 0".to_string());
        }

        if self.workers.num_workers > 1000 {
            errors.push("Number of workers should not exceed 1000".to_string());
        }

        if self.workers.poll_backoff_base_ms == 0 {
            errors.push("Poll backoff base must be greater than 0".to_string());
        }

        if self.workers.poll_backoff_max_ms < self.workers.poll_backoff_base_ms {
            errors.push("Poll backoff max must be greater than or equal to base".to_string());
        }

        if self.queue.lock_duration_secs == 0 {
            errors.push("Lock duration must be greater than 0".to_string());
        }

        if self.queue.default_retry_policy.max_attempts == 0 {
            errors.push("Retry policy must allow at least one attempt".to_string());
        }

        if self.queue.default_retry_policy.base_delay_ms == 0 {
            errors.push("Retry base delay must be greater than 0".to_string());
        }

        if self.queue.default_retry_policy.max_delay_ms
            < self.queue.default_retry_policy.base_delay_ms
        {
            errors.push("Retry max delay must be greater than or equal to base delay".to_string());
        }

        if self.scheduler.tick_ms == 0 {
            errors.push("Scheduler tick must be greater than 0".to_string());
        }

        if self.scheduler.health_check_interval_secs == 0 {
            errors.push("Health check interval must be greater than 0".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
