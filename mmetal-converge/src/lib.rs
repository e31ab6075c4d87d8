//! mmetal convergence engine.
//!
//! Drives locally-declared desired state to match remote, eventually-
//! consistent resources. Every asynchronous resource family reuses one
//! generic poller ([`poll::poll_until`]); lifecycle sequencing lives in the
//! per-family convergers. The HTTP transport and the configuration layer that
//! supplies desired state sit outside this crate, behind the `mmetal-api`
//! client traits and the [`sink::StateSink`] contract.

pub mod diff;
pub mod error;
pub mod poll;
pub mod pool;
pub mod server;
pub mod sink;
pub mod vm;

pub use diff::{diff_tags, TagChange, TagDiff};
pub use error::ConvergeError;
pub use poll::{poll_until, NotFoundPolicy, PollConfig, PollOutcome};
pub use pool::PoolConverger;
pub use server::{ServerConverger, ServerIntervals};
pub use sink::{SinkError, StateSink};
pub use vm::VmConverger;
