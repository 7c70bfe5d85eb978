//! Model Studio: a client for remote vision, speech, image and transcription
//! models driven through the engine's pixel command language.

pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod log;
pub mod models;
pub mod stores;

#[cfg(test)]
mod testing;

pub use context::AppContext;
pub use error::Error;
