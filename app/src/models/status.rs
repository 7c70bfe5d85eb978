use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clients::EngineError;

/// Where a remote model is in its lifecycle. Anything in neither the active
/// nor the warming list is cold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Lifecycle {
    Active,
    Warming,
    Cold,
}

/// Status of one remote model as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub id: String,
    pub name: String,
    pub state: Lifecycle,
}

impl ModelStatus {
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: Lifecycle) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state,
        }
    }
}

#[derive(Deserialize)]
struct RawModelStatus {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModelStatuses {
    #[serde(default)]
    active_models: Vec<RawModelStatus>,
    #[serde(default)]
    warming_models: Vec<RawModelStatus>,
}

/// Both lists from one `MyRemoteModelsStatus();` answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteModelStatuses {
    pub active: Vec<ModelStatus>,
    pub warming: Vec<ModelStatus>,
}

impl RemoteModelStatuses {
    /// Parse the engine's `{ activeModels, warmingModels }` output. An entry
    /// with an unknown or missing state takes the lifecycle of its list.
    pub fn from_output(output: Value) -> Result<Self, EngineError> {
        let raw: RawModelStatuses = serde_json::from_value(output)
            .map_err(|e| EngineError::MalformedResponse(format!("Invalid model status list: {}", e)))?;

        Ok(Self {
            active: convert(raw.active_models, Lifecycle::Active),
            warming: convert(raw.warming_models, Lifecycle::Warming),
        })
    }
}

fn convert(models: Vec<RawModelStatus>, list: Lifecycle) -> Vec<ModelStatus> {
    models
        .into_iter()
        .map(|model| {
            let state = model
                .state
                .as_deref()
                .and_then(|state| Lifecycle::from_str(state.trim()).ok())
                .unwrap_or(list);
            ModelStatus::new(model.id, model.name, state)
        })
        .collect()
}
