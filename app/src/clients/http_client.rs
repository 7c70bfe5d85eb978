use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;

use super::client::PixelTransport;
use super::config::{ApiConfig, Credentials};
use super::error::EngineError;
use super::response::{PixelResponse, UploadedFile};

const RUN_PIXEL_PATH: &str = "api/engine/runPixel";
const UPLOAD_PATH: &str = "api/uploadFile/baseUpload";
/// Insight id that asks the engine to open a fresh insight
const NEW_INSIGHT: &str = "new";

/// HTTP connection to the engine's REST endpoints
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    insight_id: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            insight_id: Mutex::new(config.insight_id),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn add_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => request.basic_auth(
                &credentials.access_key,
                Some(credentials.secret_key.expose_secret()),
            ),
            None => request,
        }
    }

    fn current_insight(&self) -> String {
        self.insight_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| NEW_INSIGHT.to_string())
    }

    fn remember_insight(&self, insight_id: &str) {
        let mut current = self.insight_id.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_deref() != Some(insight_id) {
            info!("Bound to insight {}", insight_id);
            *current = Some(insight_id.to_string());
        }
    }

    /// Check status and read the body as text
    async fn read_body(response: Response) -> Result<String, EngineError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("Engine rejected credentials ({})", status);
            return Err(EngineError::Unauthorized);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Engine error response ({}): {}", status, body);
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(|e| {
            error!("Failed to read response body: {}", e);
            EngineError::Transport(format!("Failed to read response: {}", e))
        })
    }
}

#[async_trait]
impl PixelTransport for HttpTransport {
    async fn run_pixel(&self, expression: &str) -> Result<PixelResponse, EngineError> {
        let insight_id = self.current_insight();
        let request = self
            .http
            .post(self.url(RUN_PIXEL_PATH))
            .form(&[("expression", expression), ("insightId", insight_id.as_str())]);
        let request = self.add_auth(request);

        let response = request.send().await.map_err(|e| {
            error!("runPixel request error: {}", e);
            EngineError::Transport(e.to_string())
        })?;

        let body = Self::read_body(response).await?;
        let parsed = PixelResponse::from_body(&body)?;

        if let Some(id) = &parsed.insight_id {
            self.remember_insight(id);
        }

        debug!(
            "runPixel returned {} entries, {} errors",
            parsed.pixel_return.len(),
            parsed.errors.len()
        );

        Ok(parsed)
    }

    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<UploadedFile>, EngineError> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .http
            .post(self.url(UPLOAD_PATH))
            .query(&[("insightId", self.current_insight())])
            .multipart(form);
        let request = self.add_auth(request);

        let response = request.send().await.map_err(|e| {
            error!("Upload request error: {}", e);
            EngineError::Transport(e.to_string())
        })?;

        let body = Self::read_body(response).await?;
        let files: Vec<UploadedFile> = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse upload response: {}", e);
            EngineError::MalformedResponse(format!("Failed to parse upload response: {}", e))
        })?;

        info!("Uploaded {} ({} bytes)", file_name, size);
        Ok(files)
    }

    fn insight_id(&self) -> Option<String> {
        self.insight_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(ApiConfig {
            base_url: base_url.to_string(),
            insight_id: None,
            credentials: None,
        })
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let test_cases = vec![
            ("no trailing slash", "http://host/Monolith"),
            ("trailing slash", "http://host/Monolith/"),
            ("several trailing slashes", "http://host/Monolith//"),
        ];

        for (description, base_url) in test_cases {
            assert_eq!(
                transport(base_url).url(RUN_PIXEL_PATH),
                "http://host/Monolith/api/engine/runPixel",
                "{}",
                description
            );
        }
    }

    #[test]
    fn test_insight_defaults_to_new_until_engine_assigns_one() {
        let transport = transport("http://host");

        assert_eq!(transport.current_insight(), NEW_INSIGHT);
        assert_eq!(transport.insight_id(), None);

        transport.remember_insight("3f2c");

        assert_eq!(transport.current_insight(), "3f2c");
        assert_eq!(transport.insight_id().as_deref(), Some("3f2c"));
    }
}
