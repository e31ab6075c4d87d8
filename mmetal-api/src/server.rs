//! Bare-metal server objects and the client contract that manages them.
//!
//! A server is requested with a [`ServerSpec`] and then installs in the
//! background; the control plane only reports progress through
//! [`Server::status`]. OS reinstalls run as a separate command stream polled
//! via [`ServerApi::operation_status`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Remote lifecycle status of a bare-metal server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Requested,
    Installing,
    Delivered,
    Failed,
    Releasing,
    Released,
    /// Any status string this build does not know about.
    #[serde(other)]
    Unknown,
}

/// Kernel command-line parameter passed to the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelParam {
    pub key: String,
    pub value: String,
}

/// Disk partition layout entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub target: String,
    pub filesystem: String,
    pub size: i64,
}

/// Operating-system installation config.
///
/// Equality over this struct is the replacement trigger for updates: a server
/// whose desired `OsConfig` differs from its converged one gets a reinstall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsConfig {
    pub slug: String,
    #[serde(default)]
    pub kernel_params: Vec<KernelParam>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

/// Network address assigned to a delivered server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub ip_address: String,
}

/// Point-in-time remote view of a server. Produced by every Get; never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub uuid: String,
    pub name: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub instance_type: String,
    pub os: OsConfig,
    #[serde(default)]
    pub ip_addresses: Vec<IpAddress>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub delivered_at: i64,
    #[serde(default)]
    pub released_at: i64,
}

/// Caller-declared target configuration for a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSpec {
    pub name: String,
    pub location: String,
    pub instance_type: String,
    pub os: OsConfig,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    #[serde(default)]
    pub post_install_script: String,
}

/// Mutating payload for an OS reinstall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsPatch {
    pub name: String,
    pub os: OsConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    #[serde(default)]
    pub post_install_script: String,
}

impl OsPatch {
    /// Build the reinstall payload for a desired spec.
    pub fn from_spec(spec: &ServerSpec) -> Self {
        Self {
            name: spec.name.clone(),
            os: spec.os.clone(),
            ssh_keys: spec.ssh_keys.clone(),
            post_install_script: spec.post_install_script.clone(),
        }
    }
}

/// State of a server-scoped sub-operation (e.g. an OS reinstall command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Queued,
    Running,
    Finished,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Snapshot of a sub-operation, polled independently of the server status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub uuid: String,
    pub server_uuid: String,
    pub state: OperationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client contract for bare-metal servers.
///
/// Create and delete only enqueue work; callers poll [`ServerApi::get_server`]
/// until the status reaches a terminal value.
#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn create_server(&self, spec: &ServerSpec) -> Result<Server>;
    async fn get_server(&self, id: &str) -> Result<Server>;
    async fn reinstall_os(&self, id: &str, patch: &OsPatch) -> Result<Server>;
    async fn delete_server(&self, id: &str) -> Result<Server>;
    async fn add_tag(&self, id: &str, tag: &str) -> Result<Server>;
    async fn remove_tag(&self, id: &str, tag: &str) -> Result<Server>;
    /// Latest `update-server` command for the server, if any has been issued.
    async fn operation_status(&self, id: &str) -> Result<Option<Operation>>;
}
