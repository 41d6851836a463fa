//! Observable fleet and robot detail state
//!
//! Both stores publish whole-state replacements on `tokio::sync::watch`
//! channels. The detail store derives its input from the fleet store's
//! selection channel.

pub mod detail;
pub mod fleet;

pub use detail::{DetailState, RobotDetailStore};
pub use fleet::{FleetState, FleetStore};

use crate::logic::error::TransportError;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Lifecycle of a store's most recent load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// What a refresh call did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call fetched and published new state
    Updated,
    /// Another refresh was already running; this call waited for it and shares its result
    Coalesced,
    /// The fetch finished after a newer one started, so its result was dropped
    Discarded,
}

/// Background store task, aborted when the handle is dropped
#[derive(Debug)]
pub struct PollHandle {
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop the task and wait until it has wound down
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Run a transport call with an upper bound so a hung request resolves to an error
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    after: Duration,
    call: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout { operation, after }),
    }
}
