//! Scripted control-plane doubles and a recording sink for lifecycle tests.
//!
//! Every remote call and every sink write lands in one shared [`EventLog`]
//! so tests can assert ordering (e.g. the handle is persisted before the
//! first poll fetch) as well as call counts.

// Each integration test binary compiles this module and uses its own subset.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use mmetal_api::{
    Operation, OperationState, OsConfig, OsPatch, PoolApi, RemoteError, Server, ServerApi,
    ServerSpec, ServerStatus, VmApi, VmInstance, VmPool, VmPoolPatch, VmPoolSpec, VmSpec, VmStatus,
};
use mmetal_converge::{SinkError, StateSink};

/// Ordered log of remote calls and sink writes.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn first_index_of(&self, prefix: &str) -> Option<usize> {
        self.events().iter().position(|e| e.starts_with(prefix))
    }

    pub fn count_of(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Sink that records every write into the shared log.
#[derive(Clone)]
pub struct RecordingSink<S> {
    log: EventLog,
    snapshots: Arc<Mutex<Vec<S>>>,
}

impl<S: Clone> RecordingSink<S> {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            snapshots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn snapshots(&self) -> Vec<S> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl<S: Clone + Send + Sync> StateSink<S> for RecordingSink<S> {
    async fn persist(&self, snapshot: &S) -> Result<(), SinkError> {
        self.log.push("persist");
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

fn next<T: Clone>(queue: &mut VecDeque<mmetal_api::Result<T>>) -> mmetal_api::Result<T> {
    // Replay the script; the final entry repeats forever so timeout tests
    // can poll indefinitely.
    if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err(RemoteError::Transport("script exhausted".to_string())))
    }
}

/// Scripted responses for the server API.
#[derive(Default)]
pub struct ServerScript {
    pub create: Option<mmetal_api::Result<Server>>,
    pub delete: Option<mmetal_api::Result<Server>>,
    pub reinstall: Option<mmetal_api::Result<Server>>,
    pub gets: VecDeque<mmetal_api::Result<Server>>,
    pub operations: VecDeque<mmetal_api::Result<Option<Operation>>>,
    /// Consumed in order by add_tag and remove_tag alike.
    pub tag_calls: VecDeque<mmetal_api::Result<Server>>,
}

#[derive(Clone)]
pub struct MockServerApi {
    pub log: EventLog,
    script: Arc<Mutex<ServerScript>>,
}

impl MockServerApi {
    pub fn new(log: EventLog, script: ServerScript) -> Self {
        Self {
            log,
            script: Arc::new(Mutex::new(script)),
        }
    }
}

#[async_trait]
impl ServerApi for MockServerApi {
    async fn create_server(&self, _spec: &ServerSpec) -> mmetal_api::Result<Server> {
        self.log.push("create");
        self.script
            .lock()
            .unwrap()
            .create
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("create not scripted".to_string())))
    }

    async fn get_server(&self, _id: &str) -> mmetal_api::Result<Server> {
        self.log.push("get");
        next(&mut self.script.lock().unwrap().gets)
    }

    async fn reinstall_os(&self, _id: &str, _patch: &OsPatch) -> mmetal_api::Result<Server> {
        self.log.push("reinstall");
        self.script
            .lock()
            .unwrap()
            .reinstall
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("reinstall not scripted".to_string())))
    }

    async fn delete_server(&self, _id: &str) -> mmetal_api::Result<Server> {
        self.log.push("delete");
        self.script
            .lock()
            .unwrap()
            .delete
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("delete not scripted".to_string())))
    }

    async fn add_tag(&self, _id: &str, tag: &str) -> mmetal_api::Result<Server> {
        self.log.push(format!("add_tag:{tag}"));
        next(&mut self.script.lock().unwrap().tag_calls)
    }

    async fn remove_tag(&self, _id: &str, tag: &str) -> mmetal_api::Result<Server> {
        self.log.push(format!("remove_tag:{tag}"));
        next(&mut self.script.lock().unwrap().tag_calls)
    }

    async fn operation_status(&self, _id: &str) -> mmetal_api::Result<Option<Operation>> {
        self.log.push("op_status");
        next(&mut self.script.lock().unwrap().operations)
    }
}

/// Scripted responses for the VM API.
#[derive(Default)]
pub struct VmScript {
    pub create: Option<mmetal_api::Result<VmInstance>>,
    pub delete: Option<mmetal_api::Result<()>>,
    pub patch: Option<mmetal_api::Result<VmInstance>>,
    pub gets: VecDeque<mmetal_api::Result<VmInstance>>,
}

#[derive(Clone)]
pub struct MockVmApi {
    pub log: EventLog,
    script: Arc<Mutex<VmScript>>,
}

impl MockVmApi {
    pub fn new(log: EventLog, script: VmScript) -> Self {
        Self {
            log,
            script: Arc::new(Mutex::new(script)),
        }
    }
}

#[async_trait]
impl VmApi for MockVmApi {
    async fn create_vm(&self, _spec: &VmSpec) -> mmetal_api::Result<VmInstance> {
        self.log.push("create");
        self.script
            .lock()
            .unwrap()
            .create
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("create not scripted".to_string())))
    }

    async fn get_vm(&self, _id: &str) -> mmetal_api::Result<VmInstance> {
        self.log.push("get");
        next(&mut self.script.lock().unwrap().gets)
    }

    async fn patch_vm_tags(&self, _id: &str, tags: &[String]) -> mmetal_api::Result<VmInstance> {
        self.log.push(format!("patch_tags:{}", tags.join(",")));
        self.script
            .lock()
            .unwrap()
            .patch
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("patch not scripted".to_string())))
    }

    async fn delete_vm(&self, _id: &str) -> mmetal_api::Result<()> {
        self.log.push("delete");
        self.script
            .lock()
            .unwrap()
            .delete
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("delete not scripted".to_string())))
    }

    async fn list_vms(&self) -> mmetal_api::Result<Vec<VmInstance>> {
        self.log.push("list");
        Ok(Vec::new())
    }
}

/// Scripted responses for the pool API.
#[derive(Default)]
pub struct PoolScript {
    pub create: Option<mmetal_api::Result<VmPool>>,
    pub get: Option<mmetal_api::Result<VmPool>>,
    pub update: Option<mmetal_api::Result<VmPool>>,
    pub delete: Option<mmetal_api::Result<()>>,
}

#[derive(Clone)]
pub struct MockPoolApi {
    pub log: EventLog,
    script: Arc<Mutex<PoolScript>>,
}

impl MockPoolApi {
    pub fn new(log: EventLog, script: PoolScript) -> Self {
        Self {
            log,
            script: Arc::new(Mutex::new(script)),
        }
    }
}

#[async_trait]
impl PoolApi for MockPoolApi {
    async fn create_pool(&self, _spec: &VmPoolSpec) -> mmetal_api::Result<VmPool> {
        self.log.push("create");
        self.script
            .lock()
            .unwrap()
            .create
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("create not scripted".to_string())))
    }

    async fn get_pool(&self, _id: &str) -> mmetal_api::Result<VmPool> {
        self.log.push("get");
        self.script
            .lock()
            .unwrap()
            .get
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("get not scripted".to_string())))
    }

    async fn update_pool(&self, _id: &str, _patch: &VmPoolPatch) -> mmetal_api::Result<VmPool> {
        self.log.push("update");
        self.script
            .lock()
            .unwrap()
            .update
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("update not scripted".to_string())))
    }

    async fn delete_pool(&self, _id: &str) -> mmetal_api::Result<()> {
        self.log.push("delete");
        self.script
            .lock()
            .unwrap()
            .delete
            .clone()
            .unwrap_or_else(|| Err(RemoteError::Transport("delete not scripted".to_string())))
    }

    async fn list_pools(&self) -> mmetal_api::Result<Vec<VmPool>> {
        self.log.push("list");
        Ok(Vec::new())
    }
}

// Snapshot builders.

pub fn os(slug: &str) -> OsConfig {
    OsConfig {
        slug: slug.to_string(),
        kernel_params: Vec::new(),
        partitions: Vec::new(),
    }
}

pub fn server(uuid: &str, status: ServerStatus) -> Server {
    Server {
        uuid: uuid.to_string(),
        name: "n1".to_string(),
        status,
        status_message: String::new(),
        location: "EU: Rotterdam".to_string(),
        instance_type: "bm7.std.8".to_string(),
        os: os("debian-12"),
        ip_addresses: Vec::new(),
        tags: Vec::new(),
        created_at: 1_714_000_000,
        delivered_at: 0,
        released_at: 0,
    }
}

pub fn with_ip(mut server: Server, ip: &str) -> Server {
    server.ip_addresses = vec![mmetal_api::IpAddress {
        ip_address: ip.to_string(),
    }];
    server
}

pub fn with_tags(mut server: Server, tags: &[&str]) -> Server {
    server.tags = tags.iter().map(|t| (*t).to_string()).collect();
    server
}

pub fn server_spec(name: &str) -> ServerSpec {
    ServerSpec {
        name: name.to_string(),
        location: "EU: Rotterdam".to_string(),
        instance_type: "bm7.std.8".to_string(),
        os: os("debian-12"),
        tags: Vec::new(),
        ssh_keys: Vec::new(),
        post_install_script: String::new(),
    }
}

pub fn operation(state: OperationState) -> Operation {
    Operation {
        uuid: "op-1".to_string(),
        server_uuid: "h1".to_string(),
        state,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn vm(id: &str, status: VmStatus) -> VmInstance {
    VmInstance {
        id: id.to_string(),
        name: "vm1".to_string(),
        pool_id: "pool-1".to_string(),
        plan: "standard.4".to_string(),
        image_id: "img-debian-12".to_string(),
        user_data: String::new(),
        tags: Vec::new(),
        status,
        ip_address: String::new(),
        ip_address_v6: String::new(),
        gateway: String::new(),
        netmask: String::new(),
        vlan_id: 0,
        provisioned_at: String::new(),
    }
}

pub fn vm_spec(name: &str) -> VmSpec {
    VmSpec {
        name: name.to_string(),
        pool_id: "pool-1".to_string(),
        plan: "standard.4".to_string(),
        image_id: "img-debian-12".to_string(),
        user_data: String::new(),
        tags: Vec::new(),
    }
}

pub fn pool(id: &str) -> VmPool {
    VmPool {
        id: id.to_string(),
        name: "pool1".to_string(),
        location_id: "loc-ams".to_string(),
        contract_id: String::new(),
        pool_type: "shared".to_string(),
        instance_type: "standard.4".to_string(),
        vlan_id: 0,
        subnet: Vec::new(),
        metadata: std::collections::BTreeMap::new(),
        status: "active".to_string(),
    }
}

pub fn pool_spec(name: &str) -> VmPoolSpec {
    VmPoolSpec {
        name: name.to_string(),
        location_id: "loc-ams".to_string(),
        contract_id: String::new(),
        pool_type: "shared".to_string(),
        instance_type: "standard.4".to_string(),
        vlan_id: 0,
        subnet: Vec::new(),
        metadata: std::collections::BTreeMap::new(),
    }
}

pub fn never_cancelled() -> tokio::sync::watch::Receiver<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    std::mem::forget(tx);
    rx
}
