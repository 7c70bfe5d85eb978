//! Stable Diffusion image synthesis.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::clients::{EngineError, ImageGenerationParams, RemoteEngine};

use super::error::RunError;
use super::payload::{decode_base64, split_data_url};
use super::store::{ModelStore, ModelTask};

pub const DEFAULT_IMAGE_ENGINE: &str = "2c51591c-2d5e-4702-9d55-4b96dfb156c8";

pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, blurry, distorted, disfigured, text, watermark";

const SIDE_RANGE: (u32, u32) = (256, 1024);
const STEPS_RANGE: (u32, u32) = (1, 100);
const GUIDANCE_RANGE: (f64, f64) = (1.0, 20.0);
const IMAGES_RANGE: (u32, u32) = (1, 4);
const SEED_LIMIT: u128 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub height: u32,
    pub width: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub seed: Option<u32>,
    pub num_images: u32,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            height: 512,
            width: 512,
            num_inference_steps: 30,
            guidance_scale: 7.5,
            seed: None,
            num_images: 1,
        }
    }
}

impl ImageParams {
    fn generation(&self) -> ImageGenerationParams {
        ImageGenerationParams {
            negative_prompt: self.negative_prompt.clone(),
            height: self.height,
            width: self.width,
            num_inference_steps: self.num_inference_steps,
            guidance_scale: self.guidance_scale,
            num_images: self.num_images,
            seed: self.seed,
        }
    }
}

/// First image of a response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub data_url: String,
    pub mime: Option<String>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Pixel size read from the image itself; `None` when it can't be decoded
    pub dimensions: Option<(u32, u32)>,
}

impl GeneratedImage {
    fn from_data_url(data_url: &str) -> Result<Self, EngineError> {
        let (mime, _) = split_data_url(data_url);
        let bytes = decode_base64(data_url)?;
        let dimensions = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        if dimensions.is_none() {
            debug!("Could not read dimensions of generated image");
        }

        Ok(Self {
            data_url: data_url.to_string(),
            mime: mime.map(str::to_string),
            bytes,
            dimensions,
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), EngineError> {
        tokio::fs::write(path, &self.bytes).await?;
        info!("Saved {} bytes of image to {:?}", self.bytes.len(), path);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub image: Option<GeneratedImage>,
    pub message_id: Option<String>,
    /// Raw `response` object as the engine sent it
    pub response: Value,
}

pub struct ImageTask {
    engine_id: String,
}

impl ImageTask {
    pub fn new(engine_id: impl Into<String>) -> Self {
        Self {
            engine_id: engine_id.into(),
        }
    }
}

impl Default for ImageTask {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_ENGINE)
    }
}

#[async_trait]
impl ModelTask for ImageTask {
    type Params = ImageParams;
    type Output = ImageResult;

    fn name(&self) -> &'static str {
        "image"
    }

    fn validate(&self, params: &ImageParams) -> Result<(), RunError> {
        if params.prompt.trim().is_empty() {
            return Err(RunError::Validation(
                "Please enter a prompt to generate an image",
            ));
        }
        Ok(())
    }

    async fn execute(&self, engine: &RemoteEngine, params: ImageParams) -> Result<ImageResult, RunError> {
        let output = engine
            .generate_image(&self.engine_id, &params.prompt, &params.generation())
            .await?;
        Ok(decode_image(output)?)
    }
}

fn decode_image(mut output: Value) -> Result<ImageResult, EngineError> {
    let message_id = output["messageId"].as_str().map(str::to_string);
    let response = output
        .get_mut("response")
        .map(Value::take)
        .unwrap_or(Value::Null);

    let image = response["images"]
        .get(0)
        .and_then(Value::as_str)
        .map(GeneratedImage::from_data_url)
        .transpose()?;

    Ok(ImageResult {
        image,
        message_id,
        response,
    })
}

pub type ImageStore = ModelStore<ImageTask>;

impl ModelStore<ImageTask> {
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.update_params(|p| p.prompt = prompt);
    }

    pub fn set_negative_prompt(&self, negative_prompt: impl Into<String>) {
        let negative_prompt = negative_prompt.into();
        self.update_params(|p| p.negative_prompt = negative_prompt);
    }

    pub fn set_height(&self, height: u32) {
        self.update_params(|p| p.height = height.clamp(SIDE_RANGE.0, SIDE_RANGE.1));
    }

    pub fn set_width(&self, width: u32) {
        self.update_params(|p| p.width = width.clamp(SIDE_RANGE.0, SIDE_RANGE.1));
    }

    pub fn set_num_inference_steps(&self, steps: u32) {
        self.update_params(|p| p.num_inference_steps = steps.clamp(STEPS_RANGE.0, STEPS_RANGE.1));
    }

    pub fn set_guidance_scale(&self, scale: f64) {
        if !scale.is_finite() {
            warn!("Ignoring non-finite guidance scale {}", scale);
            return;
        }
        self.update_params(|p| p.guidance_scale = scale.clamp(GUIDANCE_RANGE.0, GUIDANCE_RANGE.1));
    }

    pub fn set_num_images(&self, count: u32) {
        self.update_params(|p| p.num_images = count.clamp(IMAGES_RANGE.0, IMAGES_RANGE.1));
    }

    pub fn set_seed(&self, seed: Option<u32>) {
        self.update_params(|p| p.seed = seed);
    }

    /// Pick a seed in `0..1_000_000` and return it
    pub fn generate_random_seed(&self) -> u32 {
        let seed = (uuid::Uuid::new_v4().as_u128() % SEED_LIMIT) as u32;
        self.set_seed(Some(seed));
        seed
    }

    /// Duration of the last run, e.g. `"3.42s"`
    pub fn formatted_generation_duration(&self) -> Option<String> {
        self.timing().and_then(|timing| timing.formatted())
    }
}
