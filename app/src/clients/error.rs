#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine ran the command and reported errors. Carries the joined messages.
    #[error("{0}")]
    RemoteExecution(String),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Engine returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Not authorized")]
    Unauthorized,
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Failed to decode payload: {0}")]
    Decode(String),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EngineError {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            EngineError::RemoteExecution(msg) => {
                if msg.to_lowercase().contains("not active") {
                    "The model is not running. Start it and try again.".to_string()
                } else {
                    format!("The engine reported an error: {}", msg)
                }
            }
            EngineError::Transport(_) => {
                "Could not reach the engine. Check the base URL and your connection.".to_string()
            }
            EngineError::Status { status, .. } => {
                format!("The engine answered with HTTP {}.", status)
            }
            EngineError::Unauthorized => {
                "Not signed in. Set MODEL_STUDIO_ACCESS_KEY and MODEL_STUDIO_SECRET_KEY.".to_string()
            }
            EngineError::MalformedResponse(_) => {
                "The engine sent a response this client does not understand.".to_string()
            }
            EngineError::Decode(msg) => format!("Could not decode the model output: {}", msg),
            EngineError::UploadFailed(msg) => format!("Upload failed: {}", msg),
            EngineError::IoError(_) => "Failed to read the local file.".to_string(),
        }
    }
}
