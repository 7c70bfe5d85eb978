use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use model_studio_pixel::Command;
use serde_json::Value;

use super::client::PixelTransport;
use super::commands::{self, ImageGenerationParams};
use super::error::EngineError;

/// Longest command prefix written to the debug log (inline images are huge)
const LOG_PREVIEW_CHARS: usize = 200;

/// Remote command adapter.
///
/// Renders typed operations into pixel commands, sends them through a
/// `PixelTransport` and unwraps the response envelope. One round trip per
/// call; no retries and no timeout.
#[derive(Clone)]
pub struct RemoteEngine {
    transport: Arc<dyn PixelTransport>,
}

impl RemoteEngine {
    pub fn new(transport: Arc<dyn PixelTransport>) -> Self {
        Self { transport }
    }

    /// Run one command and return the first payload's `output` verbatim.
    ///
    /// # Returns
    /// * `Ok(Value)` - untyped output; the caller interprets its shape
    /// * `Err(EngineError::RemoteExecution)` - the engine reported errors
    /// * `Err(EngineError)` - transport or envelope failure
    pub async fn execute(&self, command: &Command) -> Result<Value, EngineError> {
        let expression = command.to_string();
        debug!("Running pixel: {}", preview(&expression));

        let response = self.transport.run_pixel(&expression).await?;

        if !response.errors.is_empty() {
            warn!(
                "{} failed with {} error(s): {}",
                command.verb(),
                response.errors.len(),
                response.errors.join("")
            );
        }

        response.into_output()
    }

    /// Upload a local file and return the engine-side path.
    pub async fn upload_file(&self, path: &Path) -> Result<String, EngineError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| EngineError::UploadFailed(format!("{:?} is not a file", path)))?;

        let uploaded = self.transport.upload(&file_name, bytes).await?;
        let location = uploaded
            .first()
            .map(|file| file.server_path())
            .ok_or_else(|| EngineError::UploadFailed("Upload failed".to_string()))?;

        info!("Uploaded {:?} to {}", path, location);
        Ok(location)
    }

    pub fn insight_id(&self) -> Option<String> {
        self.transport.insight_id()
    }

    pub async fn vision(&self, engine: &str, prompt: &str, image: &str) -> Result<Value, EngineError> {
        self.execute(&commands::vision(engine, prompt, image)).await
    }

    pub async fn text_to_speech(
        &self,
        engine: &str,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> Result<Value, EngineError> {
        self.execute(&commands::text_to_speech(engine, text, voice, speed))
            .await
    }

    pub async fn generate_image(
        &self,
        engine: &str,
        prompt: &str,
        params: &ImageGenerationParams,
    ) -> Result<Value, EngineError> {
        self.execute(&commands::image_generation(engine, prompt, params))
            .await
    }

    pub async fn transcribe(&self, engine: Option<&str>, file_path: &str) -> Result<Value, EngineError> {
        let insight_id = self.insight_id();
        self.execute(&commands::speech_to_text(engine, file_path, insight_id.as_deref()))
            .await
    }

    pub async fn remote_models_status(&self) -> Result<Value, EngineError> {
        self.execute(&commands::remote_models_status()).await
    }

    pub async fn start_remote_model(&self, engine: &str) -> Result<Value, EngineError> {
        info!("Starting remote model {}", engine);
        self.execute(&commands::remote_model_start(engine)).await
    }

    pub async fn shutdown_remote_model(&self, engine: &str) -> Result<Value, EngineError> {
        info!("Shutting down remote model {}", engine);
        self.execute(&commands::remote_model_shutdown(engine)).await
    }

    pub async fn user_info(&self) -> Result<Value, EngineError> {
        self.execute(&commands::user_info()).await
    }

    pub async fn project_list(&self) -> Result<Value, EngineError> {
        self.execute(&commands::project_list()).await
    }

    pub async fn open_insights(&self) -> Result<Value, EngineError> {
        self.execute(&commands::open_insights()).await
    }

    pub async fn available_engines(&self) -> Result<Value, EngineError> {
        self.execute(&commands::model_engines()).await
    }

    /// Whether the session may use the engine. Answers from `GetUserInfo();`.
    pub async fn is_authorized(&self) -> bool {
        match self.user_info().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Authorization check failed: {}", e);
                false
            }
        }
    }
}

fn preview(expression: &str) -> String {
    if expression.chars().count() <= LOG_PREVIEW_CHARS {
        return expression.to_string();
    }
    let head: String = expression.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{}... ({} bytes)", head, expression.len())
}
