//! VM pool objects and their client contract.
//!
//! Pools are the only resource family that converges synchronously: the
//! control plane returns their final state directly, so nothing here is
//! polled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Subnet carved out for a pool's instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmPoolSubnet {
    pub cidr: String,
    pub gateway: String,
    pub range_start: String,
    pub range_end: String,
}

/// Point-in-time remote view of a VM pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmPool {
    pub id: String,
    pub name: String,
    pub location_id: String,
    #[serde(default)]
    pub contract_id: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    pub instance_type: String,
    #[serde(default)]
    pub vlan_id: i64,
    #[serde(default)]
    pub subnet: Vec<VmPoolSubnet>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub status: String,
}

/// Caller-declared target configuration for a VM pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmPoolSpec {
    pub name: String,
    pub location_id: String,
    #[serde(default)]
    pub contract_id: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    pub instance_type: String,
    #[serde(default)]
    pub vlan_id: i64,
    #[serde(default)]
    pub subnet: Vec<VmPoolSubnet>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// In-place mutable subset of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmPoolPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Client contract for VM pools.
#[async_trait]
pub trait PoolApi: Send + Sync {
    async fn create_pool(&self, spec: &VmPoolSpec) -> Result<VmPool>;
    async fn get_pool(&self, id: &str) -> Result<VmPool>;
    async fn update_pool(&self, id: &str, patch: &VmPoolPatch) -> Result<VmPool>;
    async fn delete_pool(&self, id: &str) -> Result<()>;
    async fn list_pools(&self) -> Result<Vec<VmPool>>;
}
