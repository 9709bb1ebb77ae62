//! Error types for RelayQ operations.

use thiserror::Error;

/// Result type used throughout RelayQ.
pub type RelayResult<T> = Result<T, RelayError>;

/// Main error type for RelayQ operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The store rejected or could not complete an operation
    #[error("Store error: {message}")]
    Store {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Job not found in the expected partition
    #[error("Job '{job_id}' not found")]
    NotFound {
        /// The job id that wasn't found
        job_id: String,
    },

    /// Handler execution failed
    #[error("Handler failed: {message}")]
    Handler {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Job exhausted its retry budget
    #[error("Job '{job_id}' exhausted {attempts} attempts")]
    AttemptsExhausted {
        /// The job id that failed permanently
        job_id: String,
        /// Number of attempts consumed
        attempts: u32,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Worker timeout
    #[error("Worker operation timed out after {timeout_secs} seconds")]
    Timeout {
        /// Timeout duration in seconds
        timeout_secs: u64,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Relay is already running
    #[error("Relay is already running")]
    AlreadyRunning,

    /// Relay is not running
    #[error("Relay is not running")]
    NotRunning,
}

impl RelayError {
    /// Create a new store error with an underlying cause
    pub fn store<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a store error from a bare message
    pub fn store_message(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new handler error
    pub fn handler<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a handler error from a bare message
    pub fn handler_message(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Create a not-found error
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound {
            job_id: job_id.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the error is a benign no-op (already-settled job).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
