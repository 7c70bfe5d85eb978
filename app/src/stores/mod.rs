mod error;
mod image_gen;
mod payload;
mod speech;
mod state;
mod store;
mod transcription;
mod vision;

pub use error::RunError;
pub use image_gen::{
    GeneratedImage, ImageParams, ImageResult, ImageStore, ImageTask, DEFAULT_IMAGE_ENGINE,
    DEFAULT_NEGATIVE_PROMPT,
};
pub use payload::{decode_base64, split_data_url, to_data_url};
pub use speech::{
    SpeechParams, SpeechResult, SpeechStore, SpeechTask, Voice, DEFAULT_SPEECH_ENGINE, MAX_SPEED,
    MIN_SPEED,
};
pub use state::{GenerationTiming, RunEvent, RunPhase, RunState, TransitionRejection};
pub use store::{ModelSnapshot, ModelStore, ModelTask, RunOutcome, Snapshot};
pub use transcription::{TranscriptionParams, TranscriptionStore, TranscriptionTask};
pub use vision::{
    VisionMode, VisionParams, VisionStore, VisionTask, DEFAULT_VISION_ENGINE, SAMPLE_IMAGE_URL,
};
