//! Florence-2 vision model: captioning, detection, grounding and OCR.

use std::path::Path;

use async_trait::async_trait;
use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::clients::{EngineError, RemoteEngine};

use super::error::RunError;
use super::payload::to_data_url;
use super::store::{ModelStore, ModelTask};

pub const DEFAULT_VISION_ENGINE: &str = "f7dd0ae0-b31c-45d4-906c-044bd217d829";

pub const SAMPLE_IMAGE_URL: &str = "https://huggingface.co/datasets/huggingface/documentation-images/resolve/main/transformers/tasks/car.jpg?download=true";

const NO_OUTPUT: &str = "No output received from model";

/// Florence task; each maps to the tag the model expects as prompt
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VisionMode {
    #[default]
    Caption,
    DetailedCaption,
    MoreDetailedCaption,
    #[strum(serialize = "od")]
    #[serde(rename = "od")]
    ObjectDetection,
    DenseRegionCaption,
    RegionProposal,
    CaptionToPhraseGrounding,
    ReferringExpressionSegmentation,
    RegionToSegmentation,
    Ocr,
    OcrWithRegion,
}

impl VisionMode {
    pub fn tag(self) -> &'static str {
        match self {
            VisionMode::Caption => "<CAPTION>",
            VisionMode::DetailedCaption => "<DETAILED_CAPTION>",
            VisionMode::MoreDetailedCaption => "<MORE_DETAILED_CAPTION>",
            VisionMode::ObjectDetection => "<OD>",
            VisionMode::DenseRegionCaption => "<DENSE_REGION_CAPTION>",
            VisionMode::RegionProposal => "<REGION_PROPOSAL>",
            VisionMode::CaptionToPhraseGrounding => "<CAPTION_TO_PHRASE_GROUNDING>",
            VisionMode::ReferringExpressionSegmentation => "<REFERRING_EXPRESSION_SEGMENTATION>",
            VisionMode::RegionToSegmentation => "<REGION_TO_SEGMENTATION>",
            VisionMode::Ocr => "<OCR>",
            VisionMode::OcrWithRegion => "<OCR_WITH_REGION>",
        }
    }

    /// Grounding and segmentation modes take free text after the tag
    pub fn needs_additional_text(self) -> bool {
        matches!(
            self,
            VisionMode::CaptionToPhraseGrounding
                | VisionMode::ReferringExpressionSegmentation
                | VisionMode::RegionToSegmentation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionParams {
    pub mode: VisionMode,
    pub image_url: String,
    /// Inline data URL; wins over `image_url` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub user_uploaded_image: bool,
    pub additional_text: String,
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            mode: VisionMode::default(),
            image_url: SAMPLE_IMAGE_URL.to_string(),
            image_data: None,
            user_uploaded_image: false,
            additional_text: String::new(),
        }
    }
}

impl VisionParams {
    /// Tag plus additional text, as typed, when the mode takes it
    pub fn prompt(&self) -> String {
        if self.mode.needs_additional_text() && !self.additional_text.is_empty() {
            format!("{} {}", self.mode.tag(), self.additional_text)
        } else {
            self.mode.tag().to_string()
        }
    }

    pub fn image_source(&self) -> &str {
        self.image_data.as_deref().unwrap_or(&self.image_url)
    }
}

pub struct VisionTask {
    engine_id: String,
}

impl VisionTask {
    pub fn new(engine_id: impl Into<String>) -> Self {
        Self {
            engine_id: engine_id.into(),
        }
    }
}

impl Default for VisionTask {
    fn default() -> Self {
        Self::new(DEFAULT_VISION_ENGINE)
    }
}

#[async_trait]
impl ModelTask for VisionTask {
    type Params = VisionParams;
    type Output = String;

    fn name(&self) -> &'static str {
        "vision"
    }

    fn validate(&self, params: &VisionParams) -> Result<(), RunError> {
        if params.image_source().trim().is_empty() {
            return Err(RunError::Validation(
                "Please upload an image or provide a URL first.",
            ));
        }
        Ok(())
    }

    async fn execute(&self, engine: &RemoteEngine, params: VisionParams) -> Result<String, RunError> {
        let output = engine
            .vision(&self.engine_id, &params.prompt(), params.image_source())
            .await?;
        Ok(response_text(&output))
    }
}

/// Text of `output.response`; structured answers (boxes, polygons) are
/// pretty-printed
fn response_text(output: &Value) -> String {
    match output.get("response") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::Null) | None => NO_OUTPUT.to_string(),
        Some(Value::String(_)) => NO_OUTPUT.to_string(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub type VisionStore = ModelStore<VisionTask>;

impl ModelStore<VisionTask> {
    pub fn set_mode(&self, mode: VisionMode) {
        self.update_params(|p| p.mode = mode);
    }

    /// Point at a remote image; drops any inline image
    pub fn set_image_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.update_params(|p| {
            p.image_url = url;
            p.image_data = None;
            p.user_uploaded_image = true;
        });
    }

    /// Use an inline data URL as the image
    pub fn set_image_data(&self, data_url: impl Into<String>) {
        let data_url = data_url.into();
        self.update_params(|p| {
            p.image_data = Some(data_url);
            p.user_uploaded_image = true;
        });
    }

    /// Read a local image and store it as a data URL
    pub async fn set_image_from_file(&self, path: &Path) -> Result<(), RunError> {
        let ticket = self.input_ticket();
        let bytes = tokio::fs::read(path).await.map_err(EngineError::from)?;
        let mime = image::guess_format(&bytes)
            .map_err(|e| EngineError::Decode(format!("{:?} is not a supported image: {}", path, e)))?
            .to_mime_type();

        let data_url = to_data_url(mime, &bytes);
        self.update_params_since(ticket, |p| {
            p.image_data = Some(data_url);
            p.user_uploaded_image = true;
        })?;
        info!("Loaded {:?} as {} ({} bytes)", path, mime, bytes.len());
        Ok(())
    }

    pub fn set_additional_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.update_params(|p| p.additional_text = text);
    }
}
