use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::clients::{EngineError, RemoteEngine};
use crate::stores::DEFAULT_VISION_ENGINE;

use super::status::{Lifecycle, ModelStatus, RemoteModelStatuses};

/// Model selected before the user picks one
pub const DEFAULT_SELECTED_MODEL: &str = "florence-2-large";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub active: Vec<ModelStatus>,
    pub warming: Vec<ModelStatus>,
    pub selected: ModelStatus,
    pub loading: bool,
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            warming: Vec::new(),
            selected: ModelStatus::new(DEFAULT_VISION_ENGINE, DEFAULT_SELECTED_MODEL, Lifecycle::Active),
            loading: false,
        }
    }
}

/// Tracks which remote models are active or warming.
///
/// Polling is caller-driven. Both lists are replaced together once the
/// engine answers; an answer to an older fetch is dropped.
pub struct ModelStatusTracker {
    engine: RemoteEngine,
    state: watch::Sender<TrackerSnapshot>,
    fetches: Mutex<u64>,
}

impl ModelStatusTracker {
    pub fn new(engine: RemoteEngine) -> Self {
        let (state, _) = watch::channel(TrackerSnapshot::default());
        Self {
            engine,
            state,
            fetches: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.state.subscribe()
    }

    pub fn active_models(&self) -> Vec<ModelStatus> {
        self.state.borrow().active.clone()
    }

    pub fn warming_models(&self) -> Vec<ModelStatus> {
        self.state.borrow().warming.clone()
    }

    pub fn selected_model(&self) -> ModelStatus {
        self.state.borrow().selected.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Refresh both lists from `MyRemoteModelsStatus();`
    pub async fn fetch_model_statuses(&self) -> Result<(), EngineError> {
        let ticket = {
            let mut fetches = self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
            *fetches += 1;
            *fetches
        };
        self.state.send_modify(|s| s.loading = true);

        let result = self
            .engine
            .remote_models_status()
            .await
            .and_then(RemoteModelStatuses::from_output);

        let latest = *self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
        if latest != ticket {
            debug!("Dropping model status fetch {} (latest is {})", ticket, latest);
            return result.map(|_| ());
        }

        match result {
            Ok(statuses) => {
                info!(
                    "{} active, {} warming remote models",
                    statuses.active.len(),
                    statuses.warming.len()
                );
                self.state.send_modify(|s| {
                    s.active = statuses.active;
                    s.warming = statuses.warming;
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                warn!("Failed to fetch model statuses: {}", e);
                self.state.send_modify(|s| s.loading = false);
                Err(e)
            }
        }
    }

    /// Lifecycle from the last fetch
    pub fn lifecycle_of(&self, id: &str) -> Lifecycle {
        let snapshot = self.state.borrow();
        if snapshot.active.iter().any(|m| m.id == id) {
            Lifecycle::Active
        } else if snapshot.warming.iter().any(|m| m.id == id) {
            Lifecycle::Warming
        } else {
            Lifecycle::Cold
        }
    }

    pub fn select_model(&self, model: ModelStatus) {
        self.state.send_modify(|s| s.selected = model);
    }

    pub async fn start_model(&self, id: &str) -> Result<(), EngineError> {
        self.engine.start_remote_model(id).await?;
        Ok(())
    }

    pub async fn stop_model(&self, id: &str) -> Result<(), EngineError> {
        self.engine.shutdown_remote_model(id).await?;
        Ok(())
    }
}
