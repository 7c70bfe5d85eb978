use async_trait::async_trait;

use super::error::EngineError;
use super::response::{PixelResponse, UploadedFile};

/// Trait for the wire connection to the remote engine (HTTP, in-memory mocks, etc.)
///
/// Each implementation knows how to:
/// - Send one pixel expression and return the response envelope
/// - Upload a file and return where the engine stored it
/// - Report the insight the connection is bound to
#[async_trait]
pub trait PixelTransport: Send + Sync {
    /// Run one pixel expression. A reported engine error is NOT a transport
    /// failure; it comes back inside `PixelResponse::errors`.
    async fn run_pixel(&self, expression: &str) -> Result<PixelResponse, EngineError>;

    /// Upload file contents into the current insight's storage.
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<UploadedFile>, EngineError>;

    /// Insight id the engine assigned to this session, once known.
    fn insight_id(&self) -> Option<String>;
}
