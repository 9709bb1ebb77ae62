//! Storage backends for RelayQ job state.
//!
//! The store is deliberately dumb: it persists job records and maintains one
//! FIFO id list per partition. All queue semantics (claiming, retries,
//! visibility timeouts) live in [`crate::queue::Queue`] and are built out of
//! the two atomic move primitives below. A job id is on exactly one
//! partition list at any time, and every cross-partition transition happens
//! inside a single store operation, which is what gives concurrent workers
//! the exactly-one-winner guarantee.
//!
//! # Examples
//!
//! ```rust
//! use relayq::store::StoreFactory;
//!
//! // In-memory store (default)
//! let store = StoreFactory::in_memory();
//! ```

use crate::job::{Job, JobId, JobState};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub use memory::MemoryStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend is unreachable or rejected the operation
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Create an unavailable error with an underlying cause
    pub fn unavailable<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<StoreError> for crate::error::RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { message, source } => {
                crate::error::RelayError::Store { message, source }
            }
        }
    }
}

/// One list per lifecycle state. Membership is the authoritative record of
/// where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Jobs eligible for claiming
    Waiting,
    /// Jobs currently held by a worker
    Active,
    /// Jobs scheduled for the future
    Delayed,
    /// Jobs that finished successfully
    Completed,
    /// Jobs that failed permanently
    Failed,
}

impl Partition {
    /// All partitions, in display order
    pub const ALL: [Partition; 5] = [
        Partition::Waiting,
        Partition::Active,
        Partition::Delayed,
        Partition::Completed,
        Partition::Failed,
    ];

    /// Stable lowercase name, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Waiting => "waiting",
            Partition::Active => "active",
            Partition::Delayed => "delayed",
            Partition::Completed => "completed",
            Partition::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JobState> for Partition {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Waiting => Partition::Waiting,
            JobState::Active => Partition::Active,
            JobState::Delayed => Partition::Delayed,
            JobState::Completed => Partition::Completed,
            JobState::Failed => Partition::Failed,
        }
    }
}

/// Predicate over a job record, used to select candidates for a move.
pub type JobPredicate<'a> = &'a (dyn Fn(&Job) -> bool + Send + Sync);

/// Mutation applied to a job record while it is being moved.
pub type JobMutation<'a> = &'a (dyn Fn(&mut Job) + Send + Sync);

/// Trait that all storage backends must implement.
///
/// The two `move_*` operations are the backbone of the queue: find, remove,
/// mutate and re-insert in one atomic step, so no job can be observed
/// between partitions and no two callers can win the same job.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a job record and push its id onto the tail of `partition`.
    async fn append(&self, partition: Partition, job: Job) -> StoreResult<JobId>;

    /// Atomically take the first job in `from` that satisfies `predicate`,
    /// apply `mutation` to it, move it to the tail of `to` and return the
    /// updated record.
    ///
    /// Returns `None` when no job in `from` matches. Under concurrent
    /// callers each matching job is handed out exactly once.
    async fn move_first(
        &self,
        from: Partition,
        to: Partition,
        predicate: JobPredicate<'_>,
        mutation: JobMutation<'_>,
    ) -> StoreResult<Option<Job>>;

    /// Atomically move the job with `id` from `from` to `to`, applying
    /// `mutation` on the way.
    ///
    /// Returns `None` when the job is not currently a member of `from`,
    /// which callers use to detect already-settled jobs.
    async fn move_job(
        &self,
        id: &JobId,
        from: Partition,
        to: Partition,
        mutation: JobMutation<'_>,
    ) -> StoreResult<Option<Job>>;

    /// Read all jobs in `partition`, in list (FIFO) order.
    async fn read_all(&self, partition: Partition) -> StoreResult<Vec<Job>>;

    /// Fetch a job record by id, wherever it lives.
    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Number of jobs currently in `partition`.
    async fn count(&self, partition: Partition) -> StoreResult<usize>;

    /// Health check for the storage backend.
    async fn health_check(&self) -> StoreResult<()>;
}

/// Convenient type alias for a shared store handle
pub type SharedStore = Arc<dyn Store>;

/// Factory methods for creating storage backends
pub struct StoreFactory;

impl StoreFactory {
    /// Create an in-memory store
    pub fn in_memory() -> SharedStore {
        Arc::new(MemoryStore::new())
    }
}
