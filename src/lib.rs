//! # RelayQ
//!
//! A durable at-least-once background job queue for Rust applications.
//!
//! ## Features
//!
//! - **At-Least-Once Delivery**: Jobs survive worker crashes via visibility locks
//! - **Delayed Jobs**: Schedule work for the future with per-job delays
//! - **Automatic Retries**: Configurable backoff between attempts
//! - **Graceful Shutdown**: Workers finish their current job before stopping
//! - **Observability**: Structured logging and a read-only monitor
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relayq::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct EmailHandler;
//!
//! #[async_trait::async_trait]
//! impl JobHandler for EmailHandler {
//!     async fn execute(&self, payload: &serde_json::Value) -> RelayResult<()> {
//!         // Your job logic here
//!         println!("sending email to {}", payload["to"]);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> RelayResult<()> {
//!     let relay = Relay::new(RelayConfig::default(), Arc::new(EmailHandler))?;
//!
//!     relay
//!         .enqueue(json!({ "to": "user@example.com" }), EnqueueOptions::new())
//!         .await?;
//!
//!     relay.start().await?;
//!     relay.wait_for_shutdown().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod job;
pub mod monitor;
pub mod queue;
pub mod store;
pub mod utils;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::core::{Relay, RelayEngine, WorkerStats};
    pub use crate::error::{RelayError, RelayResult};
    pub use crate::job::{EnqueueOptions, Job, JobHandler, JobId, JobState, JobSummary};
    pub use crate::monitor::{Monitor, PartitionCounts};
    pub use crate::queue::Queue;
    pub use crate::store::{Partition, SharedStore, Store, StoreFactory};
    pub use async_trait::async_trait;
}

pub use crate::config::*;
pub use crate::core::{Relay, RelayEngine, WorkerStats};
pub use crate::error::{RelayError, RelayResult};
pub use crate::job::{EnqueueOptions, Job, JobHandler, JobId, JobState, JobSummary};
pub use crate::monitor::{Monitor, PartitionCounts};
pub use crate::queue::Queue;
pub use crate::store::{Partition, SharedStore, Store, StoreFactory};
pub use async_trait::async_trait;
