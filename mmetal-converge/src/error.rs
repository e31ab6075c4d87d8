//! Typed failure taxonomy for convergence operations.

use mmetal_api::{ApiErrorResponse, RemoteError};
use thiserror::Error;

use crate::diff::TagChange;
use crate::sink::SinkError;

/// Failure of a single convergence operation.
///
/// Generic over the snapshot type so every variant can carry the last remote
/// view the engine observed. Invariant: once any snapshot has been observed,
/// it rides along on every subsequent error, so the caller's persisted state
/// is never behind what is known.
#[derive(Debug, Error)]
pub enum ConvergeError<S> {
    /// The control plane rejected the declared state outright. Terminal; not
    /// retriable by polling.
    #[error("request rejected: {0}")]
    Rejected(ApiErrorResponse),

    /// Deadline elapsed before a terminal status was observed. Retriable by
    /// re-invoking the same operation; the remote resource may still
    /// converge on its own.
    #[error("timed out waiting for terminal status")]
    Timeout { last: Option<S> },

    /// The caller's cancellation signal fired mid-operation. Not an
    /// application failure.
    #[error("operation cancelled")]
    Cancelled { last: Option<S> },

    /// The resource itself reached a failed terminal status. The message is
    /// the remote status message, verbatim.
    #[error("remote terminal failure: {message}")]
    Failed { message: String, last: Option<S> },

    /// Converged, but a required field was missing from the final snapshot.
    /// Treated like a remote terminal failure by callers.
    #[error("postcondition unmet: {reason}")]
    Postcondition { reason: String, last: Option<S> },

    /// Tag reconciliation stopped partway through. Not fatal: re-running the
    /// update diffs against remote state again and applies only `remaining`.
    #[error("tag reconciliation applied {} of {} changes: {source}", applied.len(), applied.len() + remaining.len())]
    PartialTags {
        applied: Vec<TagChange>,
        remaining: Vec<TagChange>,
        source: RemoteError,
        last: Option<S>,
    },

    /// A remote call outside the poll loop failed at the transport level.
    #[error("remote call failed: {source}")]
    Remote {
        source: RemoteError,
        last: Option<S>,
    },

    /// The persisted-state sink refused a write.
    #[error("state sink failure: {source}")]
    Sink {
        source: SinkError,
        last: Option<S>,
    },

    /// Poll parameters outside their contract.
    #[error("invalid poll configuration: {0}")]
    Config(&'static str),
}

impl<S> ConvergeError<S> {
    /// Last remote snapshot observed before the failure, if any.
    pub fn last(&self) -> Option<&S> {
        match self {
            ConvergeError::Rejected(_) | ConvergeError::Config(_) => None,
            ConvergeError::Timeout { last }
            | ConvergeError::Cancelled { last }
            | ConvergeError::Failed { last, .. }
            | ConvergeError::Postcondition { last, .. }
            | ConvergeError::PartialTags { last, .. }
            | ConvergeError::Remote { last, .. }
            | ConvergeError::Sink { last, .. } => last.as_ref(),
        }
    }

    /// True when re-invoking the same operation can still succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ConvergeError::Timeout { .. }
                | ConvergeError::PartialTags { .. }
                | ConvergeError::Remote {
                    source: RemoteError::Transport(_),
                    ..
                }
        )
    }

    /// Attach a fresher last-known snapshot to variants that carry one.
    pub fn with_last(self, snapshot: S) -> Self {
        match self {
            ConvergeError::Timeout { .. } => ConvergeError::Timeout {
                last: Some(snapshot),
            },
            ConvergeError::Cancelled { .. } => ConvergeError::Cancelled {
                last: Some(snapshot),
            },
            ConvergeError::Failed { message, .. } => ConvergeError::Failed {
                message,
                last: Some(snapshot),
            },
            ConvergeError::Postcondition { reason, .. } => ConvergeError::Postcondition {
                reason,
                last: Some(snapshot),
            },
            ConvergeError::PartialTags {
                applied,
                remaining,
                source,
                ..
            } => ConvergeError::PartialTags {
                applied,
                remaining,
                source,
                last: Some(snapshot),
            },
            ConvergeError::Remote { source, .. } => ConvergeError::Remote {
                source,
                last: Some(snapshot),
            },
            ConvergeError::Sink { source, .. } => ConvergeError::Sink {
                source,
                last: Some(snapshot),
            },
            other @ (ConvergeError::Rejected(_) | ConvergeError::Config(_)) => other,
        }
    }

    /// Carry the same failure for a different snapshot type. Used when a
    /// sub-operation poll fails and the error must surface against the
    /// parent resource.
    pub fn for_snapshot<T>(self, last: Option<T>) -> ConvergeError<T> {
        match self {
            ConvergeError::Rejected(e) => ConvergeError::Rejected(e),
            ConvergeError::Timeout { .. } => ConvergeError::Timeout { last },
            ConvergeError::Cancelled { .. } => ConvergeError::Cancelled { last },
            ConvergeError::Failed { message, .. } => ConvergeError::Failed { message, last },
            ConvergeError::Postcondition { reason, .. } => {
                ConvergeError::Postcondition { reason, last }
            }
            ConvergeError::PartialTags {
                applied,
                remaining,
                source,
                ..
            } => ConvergeError::PartialTags {
                applied,
                remaining,
                source,
                last,
            },
            ConvergeError::Remote { source, .. } => ConvergeError::Remote { source, last },
            ConvergeError::Sink { source, .. } => ConvergeError::Sink { source, last },
            ConvergeError::Config(reason) => ConvergeError::Config(reason),
        }
    }
}

/// Map a remote call failure, routing structured rejections to their own
/// variant.
pub(crate) fn remote_err<S>(source: RemoteError, last: Option<S>) -> ConvergeError<S> {
    match source {
        RemoteError::Api(body) => ConvergeError::Rejected(body),
        other => ConvergeError::Remote {
            source: other,
            last,
        },
    }
}
