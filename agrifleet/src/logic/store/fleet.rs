use crate::logic::adapter::{adapt_fleet_data_at, DataQualityNote};
use crate::logic::client::transport::FleetTransport;
use crate::logic::error::StoreError;
use crate::logic::store::{bounded, Phase, PollHandle, RefreshOutcome};
use crate::logic::types::{FleetStatus, TaskAssignment};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const REFRESH_ERROR: &str = "Failed to fetch fleet status. Please try again.";

/// Shortest period `start_polling` will run at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a consumer needs to render the fleet
#[derive(Debug, Clone, Default)]
pub struct FleetState {
    pub phase: Phase,
    /// Last good snapshot; kept while a later refresh is loading or has failed.
    pub snapshot: Arc<FleetStatus>,
    pub error: Option<String>,
    pub data_quality: Vec<DataQualityNote>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Fleet snapshot, selection and the refresh cycle around them
pub struct FleetStore {
    transport: Arc<dyn FleetTransport>,
    state: watch::Sender<FleetState>,
    selection: watch::Sender<Option<String>>,
    refresh_gate: Mutex<()>,
    generation: AtomicU64,
    request_timeout: Duration,
}

impl FleetStore {
    pub fn new(transport: Arc<dyn FleetTransport>, request_timeout: Duration) -> Self {
        let (state, _) = watch::channel(FleetState::default());
        let (selection, _) = watch::channel(None);
        Self {
            transport,
            state,
            selection,
            refresh_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            request_timeout,
        }
    }

    pub fn transport(&self) -> Arc<dyn FleetTransport> {
        self.transport.clone()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn state(&self) -> FleetState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FleetState> {
        self.state.subscribe()
    }

    pub fn selected_robot_id(&self) -> Option<String> {
        self.selection.borrow().clone()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<String>> {
        self.selection.subscribe()
    }

    /// Change the selected robot; blank ids clear the selection.
    /// Subscribers are only notified when the value actually changes.
    pub fn select_robot(&self, robot_id: Option<&str>) {
        let next = robot_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        self.selection.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = ?current, to = ?next, "selection changed");
            *current = next;
            true
        });
    }

    /// Fetch and publish a new snapshot. A call made while another refresh is
    /// running waits for it and reports `Coalesced` instead of fetching again.
    pub async fn refresh(&self) -> Result<RefreshOutcome, StoreError> {
        match self.refresh_gate.try_lock() {
            Ok(_guard) => self.fetch().await,
            Err(_) => {
                debug!("refresh already in flight, joining it");
                let _guard = self.refresh_gate.lock().await;
                let state = self.state.borrow();
                match (&state.phase, &state.error) {
                    (Phase::Error, Some(message)) => Err(StoreError::Refresh(message.clone())),
                    _ => Ok(RefreshOutcome::Coalesced),
                }
            }
        }
    }

    /// Refresh that always performs its own fetch once any in-flight one is done
    async fn refresh_after_mutation(&self) -> Result<RefreshOutcome, StoreError> {
        let _guard = self.refresh_gate.lock().await;
        self.fetch().await
    }

    async fn fetch(&self) -> Result<RefreshOutcome, StoreError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| state.phase = Phase::Loading);

        let result = bounded(
            "fleet status",
            self.request_timeout,
            self.transport.get_fleet_raw(),
        )
        .await;

        // Fetches are serialized by `refresh_gate`, so this only trips if a fetch ever runs outside it.
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding stale fleet refresh");
            return Ok(RefreshOutcome::Discarded);
        }

        match result {
            Ok(raw) => {
                let now = Utc::now();
                let adapted = adapt_fleet_data_at(&raw, now);
                debug!(
                    robots = adapted.value.robots.len(),
                    notes = adapted.notes.len(),
                    "fleet snapshot refreshed"
                );
                self.state.send_replace(FleetState {
                    phase: Phase::Ready,
                    snapshot: Arc::new(adapted.value),
                    error: None,
                    data_quality: adapted.notes,
                    last_refreshed: Some(now),
                });
                Ok(RefreshOutcome::Updated)
            }
            Err(err) => {
                warn!(error = %err, "fleet refresh failed");
                self.state.send_modify(|state| {
                    state.phase = Phase::Error;
                    state.error = Some(REFRESH_ERROR.to_string());
                });
                Err(StoreError::Refresh(REFRESH_ERROR.to_string()))
            }
        }
    }

    /// Send a task to a robot, then refresh the fleet so the new queue shows up.
    /// Nothing in the store changes when the assignment fails.
    pub async fn assign_task_to_robot(
        &self,
        robot_id: &str,
        task: &str,
    ) -> Result<TaskAssignment, StoreError> {
        let task = task.trim();
        if task.is_empty() {
            return Err(StoreError::EmptyTask);
        }
        let known_status = self.state.borrow().snapshot.robot(robot_id).map(|r| r.status);
        if let Some(status) = known_status.filter(|s| !s.accepts_tasks()) {
            return Err(StoreError::RobotUnavailable {
                id: robot_id.to_string(),
                status,
            });
        }

        let reply = bounded(
            "task assignment",
            self.request_timeout,
            self.transport.assign_task(robot_id, task),
        )
        .await?;
        if !reply.success {
            warn!(robot = %robot_id, message = %reply.message, "task rejected");
            return Err(StoreError::TaskRejected(reply.message));
        }
        info!(robot = %robot_id, task = %task, "task assigned");

        if let Err(err) = self.refresh_after_mutation().await {
            warn!(error = %err, "refresh after task assignment failed");
        }
        Ok(reply)
    }

    /// Refresh now and then every `interval` until the handle is dropped.
    /// Intervals below `MIN_POLL_INTERVAL` are raised to it.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> PollHandle {
        let store = Arc::clone(self);
        if interval < MIN_POLL_INTERVAL {
            warn!(?interval, "poll interval too short, using {:?}", MIN_POLL_INTERVAL);
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        PollHandle::new(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.refresh().await {
                    Ok(outcome) => debug!(?outcome, "poll tick"),
                    Err(err) => debug!(error = %err, "poll tick failed"),
                }
            }
        }))
    }
}
