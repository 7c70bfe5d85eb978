//! Whisper speech-to-text over an uploaded audio file.

use std::path::Path;

use async_trait::async_trait;
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::clients::{EngineError, RemoteEngine};

use super::error::RunError;
use super::store::{ModelStore, ModelTask};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionParams {
    /// Server-side path returned by the upload endpoint
    pub audio_file_path: Option<String>,
}

/// Without an engine id the engine falls back to its default speech model
#[derive(Default)]
pub struct TranscriptionTask {
    engine_id: Option<String>,
}

impl TranscriptionTask {
    pub fn new(engine_id: Option<String>) -> Self {
        Self { engine_id }
    }
}

#[async_trait]
impl ModelTask for TranscriptionTask {
    type Params = TranscriptionParams;
    type Output = String;

    fn name(&self) -> &'static str {
        "transcription"
    }

    fn validate(&self, params: &TranscriptionParams) -> Result<(), RunError> {
        match params.audio_file_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Ok(()),
            _ => Err(RunError::Validation(
                "Please upload an audio file or record audio first.",
            )),
        }
    }

    async fn execute(
        &self,
        engine: &RemoteEngine,
        params: TranscriptionParams,
    ) -> Result<String, RunError> {
        let path = params.audio_file_path.unwrap_or_default();
        let output = engine.transcribe(self.engine_id.as_deref(), &path).await?;
        Ok(transcript(&output)?)
    }
}

fn transcript(output: &Value) -> Result<String, EngineError> {
    output
        .as_str()
        .or_else(|| output["response"].as_str())
        .map(str::to_string)
        .ok_or_else(|| EngineError::Decode("No transcription received from model".to_string()))
}

pub type TranscriptionStore = ModelStore<TranscriptionTask>;

impl ModelStore<TranscriptionTask> {
    pub fn set_audio_file(&self, server_path: impl Into<String>) {
        let server_path = server_path.into();
        self.update_params(|p| p.audio_file_path = Some(server_path));
    }

    /// Upload a local recording and remember where the engine stored it.
    ///
    /// A reset while the upload is in flight wins; the location is then
    /// dropped and `RunError::Discarded` returned.
    pub async fn upload_audio(&self, path: &Path) -> Result<String, RunError> {
        let ticket = self.input_ticket();
        let location = self.engine().upload_file(path).await?;
        self.update_params_since(ticket, |p| p.audio_file_path = Some(location.clone()))?;
        info!("Audio {:?} ready for transcription at {}", path, location);
        Ok(location)
    }
}
