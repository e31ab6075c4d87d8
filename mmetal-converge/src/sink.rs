//! Persisted-state sink contract.

use async_trait::async_trait;
use thiserror::Error;

/// Failure writing to the caller's persistent store.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Where converged and partially-converged snapshots are written.
///
/// The configuration layer that owns durable state implements this. The
/// engine enforces a two-phase write on create: the snapshot carrying the
/// fresh handle is persisted before the first poll fetch, so an interrupted
/// process never loses the ability to clean up a billable remote resource.
/// The converged snapshot is written again once the operation completes;
/// update and delete write once after completion.
#[async_trait]
pub trait StateSink<S>: Send + Sync {
    async fn persist(&self, snapshot: &S) -> Result<(), SinkError>;
}
