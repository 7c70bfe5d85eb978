//! Pixel commands for every engine operation the studio uses.
//!
//! Builders only assemble a `Command`; sanitizing user text happens when the
//! command is rendered.

use model_studio_pixel::{Command, Value};

/// Parameters of one image-synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGenerationParams {
    pub negative_prompt: String,
    pub height: u32,
    pub width: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub num_images: u32,
    pub seed: Option<u32>,
}

pub fn vision(engine: &str, prompt: &str, image: &str) -> Command {
    Command::new("Vision")
        .arg("engine", engine)
        .arg("command", prompt)
        .arg("image", image)
}

pub fn text_to_speech(engine: &str, text: &str, voice: &str, speed: f64) -> Command {
    // The speech engine takes every param as a string
    let params = Value::map([("voice", voice.to_string()), ("speed", speed.to_string())]);

    Command::new("LLM")
        .arg("engine", engine)
        .arg("command", text)
        .arg("paramValues", Value::List(vec![params]))
}

pub fn image_generation(engine: &str, prompt: &str, params: &ImageGenerationParams) -> Command {
    let mut entries = vec![
        ("negative_prompt", Value::from(params.negative_prompt.as_str())),
        ("height", Value::from(params.height)),
        ("width", Value::from(params.width)),
        ("num_inference_steps", Value::from(params.num_inference_steps)),
    ];
    // A non-finite scale has no literal form; the engine then uses its default
    if let Some(scale) = Value::number(params.guidance_scale) {
        entries.push(("guidance_scale", scale));
    }
    entries.push(("num_images", Value::from(params.num_images)));
    if let Some(seed) = params.seed {
        entries.push(("seed", Value::from(seed)));
    }

    Command::new("LLM")
        .arg("engine", engine)
        .arg("command", prompt)
        .arg("paramValues", Value::List(vec![Value::map(entries)]))
}

pub fn speech_to_text(engine: Option<&str>, file_path: &str, insight_id: Option<&str>) -> Command {
    Command::new("SpeechToText")
        .arg_opt("engine", engine)
        .arg("filepath", file_path)
        .arg_opt("insightId", insight_id)
}

pub fn remote_models_status() -> Command {
    Command::new("MyRemoteModelsStatus")
}

pub fn remote_model_start(engine: &str) -> Command {
    Command::new("RemoteModelStart").arg("engine", engine)
}

pub fn remote_model_shutdown(engine: &str) -> Command {
    Command::new("RemoteModelShutdown").arg("engine", engine)
}

pub fn user_info() -> Command {
    Command::new("GetUserInfo")
}

pub fn project_list() -> Command {
    Command::new("GetProjectList")
}

pub fn open_insights() -> Command {
    Command::new("MyOpenInsights")
}

pub fn model_engines() -> Command {
    Command::new("MyEngines").arg("engineTypes", vec!["MODEL"])
}
