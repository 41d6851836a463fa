use crate::logic::adapter::{adapt_robot_details_at, DataQualityNote};
use crate::logic::client::transport::FleetTransport;
use crate::logic::error::StoreError;
use crate::logic::store::{bounded, FleetStore, Phase, PollHandle, RefreshOutcome};
use crate::logic::types::RobotDetails;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

const DETAIL_ERROR: &str = "Failed to fetch robot details. Please try again.";

/// Detail record for the selected robot
#[derive(Debug, Clone, Default)]
pub struct DetailState {
    pub phase: Phase,
    /// Robot the state belongs to; `None` when nothing is selected
    pub robot_id: Option<String>,
    pub details: Option<Arc<RobotDetails>>,
    pub error: Option<String>,
    pub data_quality: Vec<DataQualityNote>,
}

/// Extended record of whichever robot the fleet store has selected
pub struct RobotDetailStore {
    transport: Arc<dyn FleetTransport>,
    selection: watch::Receiver<Option<String>>,
    state: watch::Sender<DetailState>,
    generation: AtomicU64,
    request_timeout: Duration,
}

impl RobotDetailStore {
    pub fn new(
        transport: Arc<dyn FleetTransport>,
        selection: watch::Receiver<Option<String>>,
        request_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(DetailState::default());
        Self {
            transport,
            selection,
            state,
            generation: AtomicU64::new(0),
            request_timeout,
        }
    }

    /// Detail store keyed on `fleet`'s selection, sharing its transport
    pub fn for_fleet(fleet: &FleetStore) -> Self {
        Self::new(
            fleet.transport(),
            fleet.subscribe_selection(),
            fleet.request_timeout(),
        )
    }

    pub fn state(&self) -> DetailState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state.subscribe()
    }

    /// Re-fetch the currently selected robot
    pub async fn refresh(&self) -> Result<RefreshOutcome, StoreError> {
        let selected = self.selection.borrow().clone();
        self.load(selected).await
    }

    /// Load details for `robot_id`, or clear the record when it is `None`.
    /// The result is dropped if a newer load started or the selection moved on meanwhile.
    pub async fn load(&self, robot_id: Option<String>) -> Result<RefreshOutcome, StoreError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(robot_id) = robot_id else {
            self.state.send_replace(DetailState::default());
            return Ok(RefreshOutcome::Updated);
        };

        self.state.send_modify(|state| {
            if state.robot_id.as_deref() != Some(robot_id.as_str()) {
                state.details = None;
                state.data_quality.clear();
            }
            state.phase = Phase::Loading;
            state.robot_id = Some(robot_id.clone());
            state.error = None;
        });

        let result = bounded(
            "robot details",
            self.request_timeout,
            self.transport.get_robot_raw(&robot_id),
        )
        .await;

        let still_selected = self.selection.borrow().as_deref() == Some(robot_id.as_str());
        if self.generation.load(Ordering::SeqCst) != generation || !still_selected {
            debug!(robot = %robot_id, generation, "discarding stale robot details");
            return Ok(RefreshOutcome::Discarded);
        }

        match result {
            Ok(raw) => {
                let mut adapted = adapt_robot_details_at(&raw, Utc::now());
                if adapted.value.robot.id.is_empty() {
                    adapted.value.robot.id = robot_id.clone();
                }
                self.state.send_replace(DetailState {
                    phase: Phase::Ready,
                    robot_id: Some(robot_id),
                    details: Some(Arc::new(adapted.value)),
                    error: None,
                    data_quality: adapted.notes,
                });
                Ok(RefreshOutcome::Updated)
            }
            Err(err) => {
                warn!(robot = %robot_id, error = %err, "robot detail fetch failed");
                self.state.send_replace(DetailState {
                    phase: Phase::Error,
                    robot_id: Some(robot_id),
                    details: None,
                    error: Some(DETAIL_ERROR.to_string()),
                    data_quality: Vec::new(),
                });
                Err(StoreError::Refresh(DETAIL_ERROR.to_string()))
            }
        }
    }

    /// Track the selection in the background. A selection change cancels the
    /// fetch still running for the previous robot.
    pub fn follow(self: &Arc<Self>) -> PollHandle {
        let store = Arc::clone(self);
        let mut selection = self.selection.clone();
        PollHandle::new(tokio::spawn(async move {
            let mut current = selection.borrow_and_update().clone();
            loop {
                tokio::select! {
                    result = store.load(current.clone()) => {
                        if let Err(err) = result {
                            debug!(error = %err, "detail load failed");
                        }
                        if selection.changed().await.is_err() {
                            break;
                        }
                    }
                    changed = selection.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        debug!("selection changed mid-fetch, cancelling");
                    }
                }
                current = selection.borrow_and_update().clone();
            }
        }))
    }
}
