//! VM instance lifecycle orchestration.
//!
//! Same create/poll/read sequencing as servers, but tag changes go through a
//! single whole-set patch and the delete poll accepts a vanished instance as
//! success.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use mmetal_api::{VmApi, VmInstance, VmSpec, VmStatus};

use crate::diff::diff_tags;
use crate::error::{remote_err, ConvergeError};
use crate::poll::{poll_until, NotFoundPolicy, PollConfig, PollOutcome};
use crate::sink::StateSink;

/// Default deadline for instance provisioning.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Default deadline for instance destruction.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

/// Drives a declared VM spec to convergence against the control plane.
pub struct VmConverger<C, K> {
    api: C,
    sink: K,
    interval: Duration,
}

impl<C, K> VmConverger<C, K>
where
    C: VmApi,
    K: StateSink<VmInstance>,
{
    pub fn new(api: C, sink: K) -> Self {
        Self {
            api,
            sink,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Request an instance and wait until it is running.
    ///
    /// The snapshot carrying the fresh handle is persisted before the first
    /// poll fetch.
    pub async fn create(
        &self,
        spec: &VmSpec,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> Result<VmInstance, ConvergeError<VmInstance>> {
        let created = self
            .api
            .create_vm(spec)
            .await
            .map_err(|e| remote_err(e, None))?;
        info!(id = %created.id, name = %spec.name, "vm requested");

        self.persist(&created).await?;

        let id = created.id.as_str();
        let mut last = created.clone();
        let result = poll_until(
            PollConfig::new(timeout, self.interval),
            cancel.clone(),
            || self.api.get_vm(id),
            |vm: &VmInstance| vm.status,
            &[VmStatus::Running, VmStatus::Error],
            NotFoundPolicy::Transient,
            |vm: &VmInstance| last = vm.clone(),
        )
        .await;

        let snapshot = match result {
            Ok(PollOutcome::Reached(vm)) => vm,
            Ok(PollOutcome::Gone) => {
                return Err(ConvergeError::Failed {
                    message: "vm disappeared while provisioning".to_string(),
                    last: Some(last),
                })
            }
            Err(e) => return Err(e.with_last(last)),
        };

        if snapshot.status == VmStatus::Error {
            return Err(ConvergeError::Failed {
                message: format!("vm {} reached error status", snapshot.id),
                last: Some(snapshot),
            });
        }

        let running = self
            .api
            .get_vm(id)
            .await
            .map_err(|e| remote_err(e, Some(snapshot)))?;
        self.persist(&running).await?;
        info!(id = %running.id, "vm running");
        Ok(running)
    }

    /// Reconcile a changed spec against a converged instance.
    ///
    /// Only tags are mutable in place. The diff runs against a fresh remote
    /// read; when it is empty, no mutating call is made at all.
    pub async fn update(
        &self,
        current: &VmInstance,
        desired: &VmSpec,
    ) -> Result<VmInstance, ConvergeError<VmInstance>> {
        let id = current.id.as_str();

        let observed = self
            .api
            .get_vm(id)
            .await
            .map_err(|e| remote_err(e, Some(current.clone())))?;

        let diff = diff_tags(&observed.tags, &desired.tags);
        let converged = if diff.is_empty() {
            debug!(id, "tags already reconciled");
            observed
        } else {
            info!(id, added = diff.added.len(), removed = diff.removed.len(), "patching tags");
            self.api
                .patch_vm_tags(id, &desired.tags)
                .await
                .map_err(|e| remote_err(e, Some(observed)))?
        };

        self.persist(&converged).await?;
        Ok(converged)
    }

    /// Destroy an instance and wait for it to be gone.
    ///
    /// A not-found response while polling counts as destroyed.
    pub async fn delete(
        &self,
        vm: &VmInstance,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Option<VmInstance>, ConvergeError<VmInstance>> {
        self.api
            .delete_vm(&vm.id)
            .await
            .map_err(|e| remote_err(e, Some(vm.clone())))?;
        info!(id = %vm.id, "destroy requested");

        let id = vm.id.as_str();
        let mut last = vm.clone();
        let result = poll_until(
            PollConfig::new(timeout, self.interval),
            cancel.clone(),
            || self.api.get_vm(id),
            |i: &VmInstance| i.status,
            &[VmStatus::Destroyed],
            NotFoundPolicy::Terminal,
            |i: &VmInstance| last = i.clone(),
        )
        .await;

        match result {
            Ok(PollOutcome::Reached(i)) => {
                self.persist(&i).await?;
                info!(id, "vm destroyed");
                Ok(Some(i))
            }
            Ok(PollOutcome::Gone) => {
                info!(id, "vm gone");
                Ok(None)
            }
            Err(e) => Err(e.with_last(last)),
        }
    }

    /// Refresh the caller's view of an existing instance.
    pub async fn read(&self, id: &str) -> Result<VmInstance, ConvergeError<VmInstance>> {
        let vm = self
            .api
            .get_vm(id)
            .await
            .map_err(|e| remote_err(e, None))?;
        self.persist(&vm).await?;
        Ok(vm)
    }

    async fn persist(&self, snapshot: &VmInstance) -> Result<(), ConvergeError<VmInstance>> {
        self.sink
            .persist(snapshot)
            .await
            .map_err(|source| ConvergeError::Sink {
                source,
                last: Some(snapshot.clone()),
            })
    }
}
