//! Asynchronous message processing for plaza.
//!
//! - **Pool**: [`WorkerPool`], a bounded queue drained by a bounded number of
//!   concurrent workers, generic over the message type
//! - **Messages**: [`FromClientApi`] and [`FromFederator`], one pool each
//! - **Retry**: [`RetryConfig`], exponential backoff for network collaborators

pub mod message;
pub mod pool;
pub mod retry;

pub use message::{ActivityType, FromClientApi, FromFederator, Payload};
pub use pool::{PoolError, PoolStats, ProcessFn, WorkerPool};
pub use retry::RetryConfig;
