//! Response envelope of the engine's `runPixel` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::EngineError;

/// Marker the engine puts in `operationType` when a pixel failed.
const ERROR_OPERATION: &str = "ERROR";

/// One entry of `pixelReturn`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelReturn {
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub operation_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_expression: Option<String>,
}

impl PixelReturn {
    pub fn is_error(&self) -> bool {
        self.operation_type
            .iter()
            .any(|op| op.to_uppercase().contains(ERROR_OPERATION))
    }
}

/// `{ errors, pixelReturn }` as seen by callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelResponse {
    pub insight_id: Option<String>,
    pub errors: Vec<String>,
    pub pixel_return: Vec<PixelReturn>,
}

#[derive(Deserialize)]
struct RawPixelResponse {
    #[serde(rename = "insightID", default)]
    insight_id: Option<String>,
    #[serde(rename = "pixelReturn", default)]
    pixel_return: Vec<PixelReturn>,
}

impl PixelResponse {
    /// A response whose first payload is `output`.
    pub fn success(output: Value) -> Self {
        Self {
            insight_id: None,
            errors: Vec::new(),
            pixel_return: vec![PixelReturn {
                output,
                operation_type: vec!["OPERATION".to_string()],
                pixel_expression: None,
            }],
        }
    }

    /// A response reporting the given errors.
    pub fn failure<S: Into<String>>(errors: impl IntoIterator<Item = S>) -> Self {
        Self {
            insight_id: None,
            errors: errors.into_iter().map(Into::into).collect(),
            pixel_return: Vec::new(),
        }
    }

    /// Parse the raw HTTP body. Entries flagged as errors contribute their
    /// output to `errors`.
    pub fn from_body(body: &str) -> Result<Self, EngineError> {
        let raw: RawPixelResponse = serde_json::from_str(body)
            .map_err(|e| EngineError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let errors = raw
            .pixel_return
            .iter()
            .filter(|entry| entry.is_error())
            .map(|entry| match &entry.output {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            })
            .collect();

        Ok(Self {
            insight_id: raw.insight_id,
            errors,
            pixel_return: raw.pixel_return,
        })
    }

    /// Fail on any reported error, otherwise hand back the first payload's
    /// `output` untouched.
    pub fn into_output(self) -> Result<Value, EngineError> {
        if !self.errors.is_empty() {
            return Err(EngineError::RemoteExecution(self.errors.join("")));
        }

        self.pixel_return
            .into_iter()
            .next()
            .map(|entry| entry.output)
            .ok_or_else(|| EngineError::MalformedResponse("pixelReturn is empty".to_string()))
    }
}

/// One entry of the upload endpoint's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_name: String,
    pub file_location: String,
}

impl UploadedFile {
    /// Server-side path with Windows separators rewritten to `/`.
    pub fn server_path(&self) -> String {
        self.file_location.replace('\\', "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_body_collects_errors() {
        let body = json!({
            "insightID": "abc",
            "pixelReturn": [
                { "output": "Engine is not active. ", "operationType": ["ERROR"] },
                { "output": "Try again later", "operationType": ["ERROR", "INVALID_SYNTAX"] }
            ]
        })
        .to_string();

        let response = PixelResponse::from_body(&body).unwrap();

        assert_eq!(response.insight_id.as_deref(), Some("abc"));
        assert_eq!(response.errors, vec!["Engine is not active. ", "Try again later"]);
        match response.into_output() {
            Err(EngineError::RemoteExecution(msg)) => {
                assert_eq!(msg, "Engine is not active. Try again later")
            }
            other => panic!("expected remote execution error, got {:?}", other),
        }
    }

    #[test]
    fn test_into_output_returns_first_payload_verbatim() {
        let test_cases = vec![
            ("string output", json!("hello")),
            ("object output", json!({ "response": { "images": ["data:image/png;base64,AA=="] } })),
            ("null output", Value::Null),
            ("list output", json!([1, 2, 3])),
        ];

        for (description, output) in test_cases {
            let mut response = PixelResponse::success(output.clone());
            response.pixel_return.push(PixelReturn {
                output: json!("second entry is ignored"),
                ..Default::default()
            });

            assert_eq!(response.into_output().unwrap(), output, "{}", description);
        }
    }

    #[test]
    fn test_errors_win_over_payload() {
        let mut response = PixelResponse::success(json!("ignored"));
        response.errors.push("boom".to_string());

        assert!(matches!(
            response.into_output(),
            Err(EngineError::RemoteExecution(msg)) if msg == "boom"
        ));
    }

    #[test]
    fn test_empty_pixel_return_is_malformed() {
        let response = PixelResponse::from_body(r#"{"insightID":"x","pixelReturn":[]}"#).unwrap();

        assert!(matches!(
            response.into_output(),
            Err(EngineError::MalformedResponse(_))
        ));
        assert!(matches!(
            PixelResponse::from_body("<html>login</html>"),
            Err(EngineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_uploaded_file_server_path() {
        let file = UploadedFile {
            file_name: "clip.wav".to_string(),
            file_location: r"C:\semoss\insight\clip.wav".to_string(),
        };

        assert_eq!(file.server_path(), "C:/semoss/insight/clip.wav");
    }
}
