//! Virtual-machine instance objects and their client contract.
//!
//! VM instances live inside a pool and provision asynchronously like
//! servers, but tag changes apply through a single whole-set patch instead
//! of per-tag calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Remote lifecycle status of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    Provisioning,
    Running,
    Error,
    Destroying,
    Destroyed,
    #[serde(other)]
    Unknown,
}

/// Point-in-time remote view of a VM instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmInstance {
    pub id: String,
    pub name: String,
    pub pool_id: String,
    pub plan: String,
    pub image_id: String,
    #[serde(default)]
    pub user_data: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: VmStatus,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub ip_address_v6: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub vlan_id: i64,
    #[serde(default)]
    pub provisioned_at: String,
}

/// Caller-declared target configuration for a VM instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSpec {
    pub name: String,
    pub pool_id: String,
    pub plan: String,
    pub image_id: String,
    #[serde(default)]
    pub user_data: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Client contract for VM instances.
#[async_trait]
pub trait VmApi: Send + Sync {
    async fn create_vm(&self, spec: &VmSpec) -> Result<VmInstance>;
    async fn get_vm(&self, id: &str) -> Result<VmInstance>;
    /// Replace the instance's tag set wholesale.
    async fn patch_vm_tags(&self, id: &str, tags: &[String]) -> Result<VmInstance>;
    async fn delete_vm(&self, id: &str) -> Result<()>;
    async fn list_vms(&self) -> Result<Vec<VmInstance>>;
}
