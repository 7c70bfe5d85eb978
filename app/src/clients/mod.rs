mod client;
pub mod commands;
mod config;
mod engine;
mod error;
mod http_client;
mod response;

// Re-export public types
pub use client::PixelTransport;
pub use commands::ImageGenerationParams;
pub use config::{ApiConfig, Credentials, ACCESS_KEY_VAR, SECRET_KEY_VAR};
pub use engine::RemoteEngine;
pub use error::EngineError;
pub use http_client::HttpTransport;
pub use response::{PixelResponse, PixelReturn, UploadedFile};
