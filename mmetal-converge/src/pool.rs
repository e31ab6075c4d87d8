//! VM pool lifecycle orchestration.
//!
//! Pools converge synchronously: the control plane answers create, update,
//! and delete with final state, so there is nothing to poll. The converger
//! still owns error mapping and the persist-after-completion contract.

use tracing::info;

use mmetal_api::{PoolApi, VmPool, VmPoolPatch, VmPoolSpec};

use crate::error::{remote_err, ConvergeError};
use crate::sink::StateSink;

/// Drives a declared pool spec against the control plane.
pub struct PoolConverger<C, K> {
    api: C,
    sink: K,
}

impl<C, K> PoolConverger<C, K>
where
    C: PoolApi,
    K: StateSink<VmPool>,
{
    pub fn new(api: C, sink: K) -> Self {
        Self { api, sink }
    }

    pub async fn create(&self, spec: &VmPoolSpec) -> Result<VmPool, ConvergeError<VmPool>> {
        let pool = self
            .api
            .create_pool(spec)
            .await
            .map_err(|e| remote_err(e, None))?;
        info!(id = %pool.id, name = %pool.name, "pool created");
        self.persist(&pool).await?;
        Ok(pool)
    }

    pub async fn read(&self, id: &str) -> Result<VmPool, ConvergeError<VmPool>> {
        let pool = self
            .api
            .get_pool(id)
            .await
            .map_err(|e| remote_err(e, None))?;
        self.persist(&pool).await?;
        Ok(pool)
    }

    pub async fn update(
        &self,
        current: &VmPool,
        patch: &VmPoolPatch,
    ) -> Result<VmPool, ConvergeError<VmPool>> {
        let pool = self
            .api
            .update_pool(&current.id, patch)
            .await
            .map_err(|e| remote_err(e, Some(current.clone())))?;
        info!(id = %pool.id, "pool updated");
        self.persist(&pool).await?;
        Ok(pool)
    }

    pub async fn delete(&self, pool: &VmPool) -> Result<(), ConvergeError<VmPool>> {
        self.api
            .delete_pool(&pool.id)
            .await
            .map_err(|e| remote_err(e, Some(pool.clone())))?;
        info!(id = %pool.id, "pool deleted");
        Ok(())
    }

    async fn persist(&self, snapshot: &VmPool) -> Result<(), ConvergeError<VmPool>> {
        self.sink
            .persist(snapshot)
            .await
            .map_err(|source| ConvergeError::Sink {
                source,
                last: Some(snapshot.clone()),
            })
    }
}
