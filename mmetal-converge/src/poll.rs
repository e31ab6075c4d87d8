//! Generic status poller.
//!
//! One timer-driven loop shared by every asynchronous resource family:
//! fetch at a fixed interval, treat individual fetch failures as transient,
//! stop on terminal status, cancellation, or deadline. Parameterized by a
//! status-extraction function and a terminal-state set so server, VM, and
//! sub-operation polling cannot drift apart in timeout or cancellation
//! behavior.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{info, warn};

use mmetal_api::RemoteError;

use crate::error::ConvergeError;

/// Timing budget for one poll run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Overall deadline for the run.
    pub timeout: Duration,
    /// Delay between consecutive fetches, and before the first one.
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    fn validate(self) -> Result<(), &'static str> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero");
        }
        if self.interval.is_zero() {
            return Err("interval must be greater than zero");
        }
        if self.interval >= self.timeout {
            return Err("interval must be shorter than timeout");
        }
        Ok(())
    }
}

/// How a `NotFound` fetch result is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Keep polling; the resource is expected to exist.
    Transient,
    /// The resource disappearing is the goal (delete operations).
    Terminal,
}

/// Successful poll outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<S> {
    /// A fetched snapshot whose status entered the terminal set.
    Reached(S),
    /// The resource no longer exists and the policy accepts that as done.
    Gone,
}

/// Poll `fetch` every `interval` until `extract` yields a member of
/// `terminal`, the cancellation signal flips true, or the deadline elapses.
///
/// The first fetch happens one `interval` after entry. `on_snapshot` sees
/// every successfully fetched snapshot whether or not the run ultimately
/// converges; callers use it to track partial progress. Timeout and
/// cancellation errors carry the last snapshot observed, if any.
pub async fn poll_until<S, St, Fetch, Fut, Extract, Seen>(
    cfg: PollConfig,
    mut cancel: watch::Receiver<bool>,
    mut fetch: Fetch,
    extract: Extract,
    terminal: &[St],
    not_found: NotFoundPolicy,
    mut on_snapshot: Seen,
) -> Result<PollOutcome<S>, ConvergeError<S>>
where
    S: Clone,
    St: PartialEq + std::fmt::Debug,
    Fetch: FnMut() -> Fut,
    Fut: Future<Output = mmetal_api::Result<S>>,
    Extract: Fn(&S) -> St,
    Seen: FnMut(&S),
{
    if let Err(reason) = cfg.validate() {
        return Err(ConvergeError::Config(reason));
    }

    let cancelled = async {
        // Err means the sender is gone; cancellation can then never fire.
        if cancel.wait_for(|flag| *flag).await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(cancelled);

    let deadline = sleep(cfg.timeout);
    tokio::pin!(deadline);

    // First tick lands one interval from now; no fetch on entry.
    let mut ticker = interval_at(Instant::now() + cfg.interval, cfg.interval);

    let mut last: Option<S> = None;

    loop {
        tokio::select! {
            _ = &mut cancelled => {
                return Err(ConvergeError::Cancelled { last });
            }
            _ = &mut deadline => {
                return Err(ConvergeError::Timeout { last });
            }
            _ = ticker.tick() => {
                let snapshot = match fetch().await {
                    Ok(s) => s,
                    Err(RemoteError::NotFound) if not_found == NotFoundPolicy::Terminal => {
                        info!("resource gone, treating as converged");
                        return Ok(PollOutcome::Gone);
                    }
                    Err(e) => {
                        warn!(error = %e, "fetch failed, retrying on next tick");
                        continue;
                    }
                };

                on_snapshot(&snapshot);

                let status = extract(&snapshot);
                if terminal.contains(&status) {
                    info!(status = ?status, "terminal status reached");
                    return Ok(PollOutcome::Reached(snapshot));
                }
                last = Some(snapshot);
            }
        }
    }
}
