use derive_more::{Display, From};

/// Application-level error: everything the CLI can run into
#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Engine(crate::clients::EngineError),

    #[from]
    Run(crate::stores::RunError),

    #[from]
    Config(crate::config::ConfigError),

    #[from]
    Grammar(model_studio_pixel::GrammarError),

    /// A model run ended in `Failed`; carries the stored message
    Failed(String),
}

impl std::error::Error for Error {}

impl Error {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            Error::Engine(e) => e.user_message(),
            Error::Run(e) => e.user_message(),
            Error::Config(e) => e.user_message(),
            Error::Grammar(e) => format!("Not a valid pixel command: {}", e),
            Error::Failed(message) => message.clone(),
        }
    }
}
