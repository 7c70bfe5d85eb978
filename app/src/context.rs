use std::sync::Arc;

use log::info;

use crate::clients::{HttpTransport, PixelTransport, RemoteEngine};
use crate::config::EngineConfig;
use crate::models::ModelStatusTracker;
use crate::stores::{
    ImageStore, ImageTask, SpeechStore, SpeechTask, TranscriptionStore, TranscriptionTask,
    VisionStore, VisionTask,
};

/// Every long-lived holder of the studio, sharing one engine connection.
/// Created once at startup and passed to whoever needs it.
pub struct AppContext {
    pub engine: RemoteEngine,
    pub vision: VisionStore,
    pub speech: SpeechStore,
    pub image: ImageStore,
    pub transcription: TranscriptionStore,
    pub models: ModelStatusTracker,
}

impl AppContext {
    pub fn new(transport: Arc<dyn PixelTransport>, config: &EngineConfig) -> Self {
        let engine = RemoteEngine::new(transport);
        let engines = &config.engines;

        Self {
            vision: VisionStore::new(VisionTask::new(&engines.vision), engine.clone()),
            speech: SpeechStore::new(SpeechTask::new(&engines.speech), engine.clone()),
            image: ImageStore::new(ImageTask::new(&engines.image), engine.clone()),
            transcription: TranscriptionStore::new(
                TranscriptionTask::new(engines.transcription.clone()),
                engine.clone(),
            ),
            models: ModelStatusTracker::new(engine.clone()),
            engine,
        }
    }

    /// Context talking HTTP to the configured engine
    pub fn from_config(config: &EngineConfig) -> Self {
        let api = config.api_config();
        info!(
            "Connecting to {} ({})",
            api.base_url,
            if api.credentials.is_some() { "with credentials" } else { "anonymous" }
        );
        Self::new(Arc::new(HttpTransport::new(api)), config)
    }
}
