//! Kokoro text-to-speech.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::clients::{EngineError, RemoteEngine};

use super::error::RunError;
use super::payload::{decode_base64, to_data_url};
use super::store::{ModelStore, ModelTask};

pub const DEFAULT_SPEECH_ENGINE: &str = "f8716fe5-34f5-43f4-9202-1e2191a5c2ba";

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 2.0;

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
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Voice {
    #[default]
    AfHeart,
    AfAlloy,
    AfAoede,
    AfBella,
    AfJessica,
    AfKore,
    AfNicole,
    AfNova,
    AfRiver,
    AfSarah,
    SfSky,
    AmAdam,
    AmEcho,
    AmEric,
    AmFenrir,
    AmLiam,
    AmMichael,
    AmOnyx,
    AmPuck,
    AmSanta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechParams {
    pub voice: Voice,
    pub speed: f64,
    pub text: String,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            speed: 1.0,
            text: String::new(),
        }
    }
}

/// Decoded speech: playable WAV bytes plus the data URL a player can load
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResult {
    pub audio_url: String,
    #[serde(skip)]
    pub audio: Vec<u8>,
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
    pub message_id: Option<String>,
}

impl SpeechResult {
    /// Write the WAV bytes to `path`
    pub async fn save(&self, path: &Path) -> Result<(), EngineError> {
        tokio::fs::write(path, &self.audio).await?;
        info!("Saved {} bytes of audio to {:?}", self.audio.len(), path);
        Ok(())
    }
}

pub struct SpeechTask {
    engine_id: String,
}

impl SpeechTask {
    pub fn new(engine_id: impl Into<String>) -> Self {
        Self {
            engine_id: engine_id.into(),
        }
    }
}

impl Default for SpeechTask {
    fn default() -> Self {
        Self::new(DEFAULT_SPEECH_ENGINE)
    }
}

#[async_trait]
impl ModelTask for SpeechTask {
    type Params = SpeechParams;
    type Output = SpeechResult;

    fn name(&self) -> &'static str {
        "speech"
    }

    fn validate(&self, params: &SpeechParams) -> Result<(), RunError> {
        if params.text.trim().is_empty() {
            return Err(RunError::Validation(
                "Please enter some text to convert to speech",
            ));
        }
        Ok(())
    }

    async fn execute(&self, engine: &RemoteEngine, params: SpeechParams) -> Result<SpeechResult, RunError> {
        let output = engine
            .text_to_speech(&self.engine_id, &params.text, params.voice.as_ref(), params.speed)
            .await?;
        Ok(decode_speech(&output)?)
    }
}

fn decode_speech(output: &Value) -> Result<SpeechResult, EngineError> {
    let response = &output["response"];
    let audio_data = response["audio_data"]
        .as_str()
        .ok_or_else(|| EngineError::Decode("No audio received from model".to_string()))?;

    let audio = decode_base64(audio_data)?;
    let mut duration_secs = response["duration"].as_f64();
    let mut sample_rate = response["sample_rate"]
        .as_u64()
        .and_then(|rate| u32::try_from(rate).ok());

    if duration_secs.is_none() || sample_rate.is_none() {
        match hound::WavReader::new(Cursor::new(&audio)) {
            Ok(reader) => {
                let spec = reader.spec();
                sample_rate.get_or_insert(spec.sample_rate);
                duration_secs.get_or_insert(reader.duration() as f64 / spec.sample_rate as f64);
            }
            Err(e) => debug!("Could not read WAV header: {}", e),
        }
    }

    Ok(SpeechResult {
        audio_url: to_data_url("audio/wav", &audio),
        audio,
        duration_secs,
        sample_rate,
        message_id: output["messageId"].as_str().map(str::to_string),
    })
}

pub type SpeechStore = ModelStore<SpeechTask>;

impl ModelStore<SpeechTask> {
    pub fn set_voice(&self, voice: Voice) {
        self.update_params(|p| p.voice = voice);
    }

    /// Clamped to `MIN_SPEED..=MAX_SPEED`; NaN and infinities are ignored
    pub fn set_speed(&self, speed: f64) {
        if !speed.is_finite() {
            warn!("Ignoring non-finite speed {}", speed);
            return;
        }
        self.update_params(|p| p.speed = speed.clamp(MIN_SPEED, MAX_SPEED));
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.update_params(|p| p.text = text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::RunOutcome;
    use crate::testing::MockTransport;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::json;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn store(mock: &MockTransport) -> SpeechStore {
        SpeechStore::new(SpeechTask::new("tts-id"), mock.engine())
    }

    /// 0.5 seconds of silence at 24 kHz
    fn silent_wav() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for _ in 0..12_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        bytes
    }

    #[test]
    fn test_voices() {
        assert_eq!(Voice::iter().count(), 20);
        assert_eq!(Voice::default().to_string(), "af_heart");
        assert_eq!(Voice::from_str("sf_sky").unwrap(), Voice::SfSky);
        assert_eq!(Voice::AmMichael.as_ref(), "am_michael");
        assert!(Voice::from_str("zz_nobody").is_err());
    }

    #[tokio::test]
    async fn test_speed_is_clamped() {
        let mock = MockTransport::new();
        let store = store(&mock);

        let test_cases = vec![
            ("in range", 1.5, 1.5),
            ("too slow", 0.0, MIN_SPEED),
            ("too fast", 3.0, MAX_SPEED),
            ("lower bound", 0.1, 0.1),
            ("not a number keeps previous", f64::NAN, 0.1),
            ("infinity keeps previous", f64::INFINITY, 0.1),
        ];

        for (description, input, expected) in test_cases {
            store.set_speed(input);
            assert_eq!(store.params().speed, expected, "{}", description);
        }
    }

    #[tokio::test]
    async fn test_hello_world_round_trip() {
        let mock = MockTransport::new();
        mock.push_output(json!({
            "response": { "audio_data": "UklGRg==", "duration": 1.5, "sample_rate": 24000 },
            "messageId": "msg-1"
        }));
        let store = store(&mock);
        store.set_text("Hello world");
        store.set_voice(Voice::AfBella);

        let outcome = store.run().await;

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(
            mock.expressions(),
            vec![r#"LLM ( engine = "tts-id", command = "Hello world", paramValues = [{"voice":"af_bella","speed":"1"}] ) ;"#]
        );
        let result = store.output().unwrap();
        assert_eq!(result.audio, b"RIFF");
        assert_eq!(result.audio_url, "data:audio/wav;base64,UklGRg==");
        assert_eq!(result.duration_secs, Some(1.5));
        assert_eq!(result.sample_rate, Some(24000));
        assert_eq!(result.message_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_quotes_in_text_become_single_quotes() {
        let mock = MockTransport::new();
        mock.push_output(json!({ "response": { "audio_data": "UklGRg==" } }));
        let store = store(&mock);
        store.set_text(r#"She said "hi""#);

        store.run().await;

        assert!(mock.expressions()[0].contains(r#"command = "She said 'hi'""#));
    }

    #[test]
    fn test_decode_speech() {
        let wav = silent_wav();
        let prefixed = format!("data:audio/wav;base64,{}", STANDARD.encode(&wav));

        let result = decode_speech(&json!({ "response": { "audio_data": prefixed } })).unwrap();

        assert_eq!(result.audio, wav);
        assert_eq!(result.sample_rate, Some(24_000));
        assert_eq!(result.duration_secs, Some(0.5));
        assert_eq!(result.message_id, None);
    }

    #[test]
    fn test_decode_speech_failures() {
        let test_cases = vec![
            ("missing response", json!({ "messageId": "m" })),
            ("missing audio", json!({ "response": { "duration": 1.0 } })),
            ("bad base64", json!({ "response": { "audio_data": "%%%" } })),
        ];

        for (description, output) in test_cases {
            assert!(
                matches!(decode_speech(&output), Err(EngineError::Decode(_))),
                "{}",
                description
            );
        }
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let mock = MockTransport::new();
        let store = store(&mock);
        store.set_text("   ");

        assert_eq!(store.run().await, RunOutcome::Rejected);
        assert_eq!(
            store.error().as_deref(),
            Some("Please enter some text to convert to speech")
        );
        assert!(!store.is_processing());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let mock = MockTransport::new();
        let store = store(&mock);
        store.set_voice(Voice::AmAdam);
        store.set_speed(1.8);
        store.set_text("hello");

        store.reset();

        let params = store.params();
        assert_eq!(params.voice, Voice::AfHeart);
        assert_eq!(params.speed, 1.0);
        assert!(params.text.is_empty());
    }

    #[tokio::test]
    async fn test_save_writes_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let result = SpeechResult {
            audio_url: String::new(),
            audio: silent_wav(),
            duration_secs: None,
            sample_rate: None,
            message_id: None,
        };

        result.save(&path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), result.audio);
    }
}
