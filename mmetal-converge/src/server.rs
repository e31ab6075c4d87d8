//! Bare-metal server lifecycle orchestration.
//!
//! Sequences the create, update, and delete flows for servers: mutate,
//! persist the partial result, poll to a terminal status, read the final
//! view. OS reinstalls are a sub-operation with their own status stream;
//! tag reconciliation is best-effort per-tag mutation that an idempotent
//! re-run completes.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use mmetal_api::{
    Operation, OperationState, OsPatch, RemoteError, Server, ServerApi, ServerSpec, ServerStatus,
};

use crate::diff::{diff_tags, TagChange};
use crate::error::{remote_err, ConvergeError};
use crate::poll::{poll_until, NotFoundPolicy, PollConfig, PollOutcome};
use crate::sink::StateSink;

/// Default deadline for server delivery.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(45 * 60);
/// Default deadline for an OS reinstall sub-operation.
pub const DEFAULT_REINSTALL_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Default deadline for server release.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Poll cadence tunables. Timeouts are per-invocation; cadence is a property
/// of the converger.
#[derive(Debug, Clone, Copy)]
pub struct ServerIntervals {
    /// Between status fetches while waiting for delivery.
    pub status: Duration,
    /// Between sub-operation fetches during a reinstall.
    pub operation: Duration,
    /// Between status fetches while waiting for release.
    pub release: Duration,
}

impl Default for ServerIntervals {
    fn default() -> Self {
        Self {
            status: Duration::from_secs(15),
            operation: Duration::from_secs(15),
            release: Duration::from_secs(5),
        }
    }
}

/// Drives a declared server spec to convergence against the control plane.
///
/// One converger call runs one operation for one server; nothing here is
/// shared between concurrently-converging resources.
pub struct ServerConverger<C, K> {
    api: C,
    sink: K,
    intervals: ServerIntervals,
}

impl<C, K> ServerConverger<C, K>
where
    C: ServerApi,
    K: StateSink<Server>,
{
    pub fn new(api: C, sink: K) -> Self {
        Self {
            api,
            sink,
            intervals: ServerIntervals::default(),
        }
    }

    pub fn with_intervals(mut self, intervals: ServerIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Request a server and wait until it is delivered.
    ///
    /// The snapshot carrying the fresh handle is persisted before the first
    /// poll fetch; a later timeout or failure leaves the handle in the
    /// caller's store so the resource can still be released.
    pub async fn create(
        &self,
        spec: &ServerSpec,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Server, ConvergeError<Server>> {
        let created = self
            .api
            .create_server(spec)
            .await
            .map_err(|e| remote_err(e, None))?;
        info!(id = %created.uuid, name = %spec.name, "server requested");

        self.persist(&created).await?;

        let id = created.uuid.as_str();
        let mut last = created.clone();
        let result = poll_until(
            PollConfig::new(timeout, self.intervals.status),
            cancel.clone(),
            || self.api.get_server(id),
            |s: &Server| s.status,
            &[ServerStatus::Delivered, ServerStatus::Failed],
            NotFoundPolicy::Transient,
            |s: &Server| last = s.clone(),
        )
        .await;

        let snapshot = match result {
            Ok(PollOutcome::Reached(s)) => s,
            Ok(PollOutcome::Gone) => {
                return Err(ConvergeError::Failed {
                    message: "server disappeared while installing".to_string(),
                    last: Some(last),
                })
            }
            Err(e) => return Err(e.with_last(last)),
        };

        if snapshot.status == ServerStatus::Failed {
            return Err(ConvergeError::Failed {
                message: snapshot.status_message.clone(),
                last: Some(snapshot),
            });
        }

        // The status poll response can omit fields like assigned addresses;
        // read the complete view before handing it back.
        let delivered = self
            .api
            .get_server(id)
            .await
            .map_err(|e| remote_err(e, Some(snapshot)))?;

        if delivered.ip_addresses.is_empty() {
            self.persist(&delivered).await?;
            return Err(ConvergeError::Postcondition {
                reason: "delivered server has no ip addresses".to_string(),
                last: Some(delivered),
            });
        }

        self.persist(&delivered).await?;
        info!(id = %delivered.uuid, "server delivered");
        Ok(delivered)
    }

    /// Reconcile a changed spec against a converged server.
    ///
    /// An OS change runs first as a remote sub-operation and aborts the whole
    /// update if it fails. Tags are diffed against a fresh remote read, so a
    /// re-run after partial progress applies only the remainder. Ends with a
    /// read and persist even when nothing needed changing.
    pub async fn update(
        &self,
        current: &Server,
        desired: &ServerSpec,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Server, ConvergeError<Server>> {
        let id = current.uuid.as_str();

        if desired.os != current.os {
            info!(id, slug = %desired.os.slug, "os changed, reinstalling");
            self.reinstall(id, desired, timeout, cancel).await?;
        } else {
            debug!(id, "os unchanged");
        }

        let observed = self
            .api
            .get_server(id)
            .await
            .map_err(|e| remote_err(e, Some(current.clone())))?;

        let diff = diff_tags(&observed.tags, &desired.tags);
        if diff.is_empty() {
            debug!(id, "tags already reconciled");
        }

        let changes = diff.changes();
        let mut applied: Vec<TagChange> = Vec::new();
        let mut last = observed;
        for (idx, change) in changes.iter().enumerate() {
            let result = match change {
                TagChange::Add(tag) => self.api.add_tag(id, tag).await,
                TagChange::Remove(tag) => self.api.remove_tag(id, tag).await,
            };
            match result {
                Ok(s) => {
                    debug!(id, change = %change, "tag reconciled");
                    applied.push(change.clone());
                    last = s;
                }
                Err(source) => {
                    warn!(id, change = %change, error = %source, "tag mutation failed");
                    return Err(ConvergeError::PartialTags {
                        applied,
                        remaining: changes[idx..].to_vec(),
                        source,
                        last: Some(last),
                    });
                }
            }
        }

        let converged = self
            .api
            .get_server(id)
            .await
            .map_err(|e| remote_err(e, Some(last)))?;
        self.persist(&converged).await?;
        Ok(converged)
    }

    /// Release a server and wait until the control plane lets go of it.
    ///
    /// A not-found response while polling counts as released. On timeout the
    /// caller keeps its record; the resource may still be releasing. Returns
    /// the final snapshot when one was observed.
    pub async fn delete(
        &self,
        server: &Server,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Option<Server>, ConvergeError<Server>> {
        let accepted = self
            .api
            .delete_server(&server.uuid)
            .await
            .map_err(|e| remote_err(e, Some(server.clone())))?;
        info!(id = %server.uuid, status = ?accepted.status, "release requested");

        let id = server.uuid.as_str();
        let mut last = accepted;
        let result = poll_until(
            PollConfig::new(timeout, self.intervals.release),
            cancel.clone(),
            || self.api.get_server(id),
            |s: &Server| s.status,
            &[ServerStatus::Released],
            NotFoundPolicy::Terminal,
            |s: &Server| last = s.clone(),
        )
        .await;

        match result {
            Ok(PollOutcome::Reached(s)) => {
                self.persist(&s).await?;
                info!(id, "server released");
                Ok(Some(s))
            }
            Ok(PollOutcome::Gone) => {
                info!(id, "server gone");
                Ok(None)
            }
            Err(e) => Err(e.with_last(last)),
        }
    }

    /// Refresh the caller's view of an existing server.
    pub async fn read(&self, id: &str) -> Result<Server, ConvergeError<Server>> {
        let server = self
            .api
            .get_server(id)
            .await
            .map_err(|e| remote_err(e, None))?;
        self.persist(&server).await?;
        Ok(server)
    }

    /// Issue the reinstall and poll its command stream to completion.
    async fn reinstall(
        &self,
        id: &str,
        desired: &ServerSpec,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(), ConvergeError<Server>> {
        let patch = OsPatch::from_spec(desired);
        let submitted = self
            .api
            .reinstall_os(id, &patch)
            .await
            .map_err(|e| remote_err(e, None))?;

        let api = &self.api;
        let result = poll_until(
            PollConfig::new(timeout, self.intervals.operation),
            cancel.clone(),
            || latest_operation(api, id),
            |op: &Operation| op.state,
            &[OperationState::Finished, OperationState::Failed],
            NotFoundPolicy::Transient,
            |op: &Operation| debug!(id, state = ?op.state, "reinstall operation"),
        )
        .await;

        match result {
            Ok(PollOutcome::Reached(op)) if op.state == OperationState::Failed => {
                Err(ConvergeError::Failed {
                    message: format!("os reinstall operation {} failed", op.uuid),
                    last: Some(submitted),
                })
            }
            Ok(_) => {
                info!(id, "os reinstall finished");
                Ok(())
            }
            Err(e) => Err(e.for_snapshot(Some(submitted))),
        }
    }

    async fn persist(&self, snapshot: &Server) -> Result<(), ConvergeError<Server>> {
        self.sink
            .persist(snapshot)
            .await
            .map_err(|source| ConvergeError::Sink {
                source,
                last: Some(snapshot.clone()),
            })
    }
}

/// The command stream can be briefly empty right after the patch is
/// accepted; surface that as a transient fetch failure so the poller just
/// waits for the next tick.
async fn latest_operation<C: ServerApi>(api: &C, id: &str) -> mmetal_api::Result<Operation> {
    match api.operation_status(id).await? {
        Some(op) => Ok(op),
        None => Err(RemoteError::Transport(
            "no update-server operation recorded yet".to_string(),
        )),
    }
}
