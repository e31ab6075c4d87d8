//! mmetal control-plane contract.
//!
//! Wire-facing resource types, status enums, and the async client traits the
//! convergence engine drives. The HTTP transport lives outside this crate;
//! anything that can reach the control plane implements these traits.

pub mod error;
pub mod pool;
pub mod server;
pub mod vm;

pub use error::{ApiErrorResponse, FieldError, RemoteError, Result};
pub use pool::{PoolApi, VmPool, VmPoolPatch, VmPoolSpec, VmPoolSubnet};
pub use server::{
    IpAddress, KernelParam, Operation, OperationState, OsConfig, OsPatch, Partition, Server,
    ServerApi, ServerSpec, ServerStatus,
};
pub use vm::{VmApi, VmInstance, VmSpec, VmStatus};
