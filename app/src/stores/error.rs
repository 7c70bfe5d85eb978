use crate::clients::EngineError;

/// Why a run (or a store-side input operation) failed
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Required input missing; the engine was never called
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The store was reset while the operation was in flight
    #[error("Discarded because the store was reset")]
    Discarded,
}

impl RunError {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            RunError::Validation(message) => message.to_string(),
            RunError::Engine(e) => e.user_message(),
            RunError::Discarded => "The model page was reset before this finished.".to_string(),
        }
    }
}
