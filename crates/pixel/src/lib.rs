//! Pixel command grammar.
//!
//! The remote engine accepts commands written as a function-call-like line of
//! text:
//!
//! ```text
//! Verb ( key = "string", count = 3, flags = [true, false], params = [{"k":"v"}] ) ;
//! ```
//!
//! This crate builds such commands from typed values and parses them back.
//! String values are embedded with minimal escaping: double quotes become
//! single quotes and nothing else is touched.
//!
//! # Example
//!
//! ```
//! use model_studio_pixel::{parse, Command, Value};
//!
//! let command = Command::new("RemoteModelStart").arg("engine", "abc-123");
//! assert_eq!(command.to_string(), r#"RemoteModelStart ( engine = "abc-123" ) ;"#);
//!
//! let parsed = parse(&command.to_string()).unwrap();
//! assert_eq!(parsed.get("engine"), Some(&Value::from("abc-123")));
//! ```

mod command;
mod parse;
mod value;

pub use command::Command;
pub use parse::parse;
pub use value::{sanitize, Value};

use thiserror::Error;

/// Errors that can occur while building or parsing a command.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum GrammarError {
    /// Input ended while more tokens were expected.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// A character did not fit the grammar at this position.
    #[error("Unexpected '{found}' at byte {position}, expected {expected}")]
    UnexpectedChar {
        found: char,
        position: usize,
        expected: &'static str,
    },

    /// A numeric literal could not be read.
    #[error("Invalid number '{text}' at byte {position}")]
    InvalidNumber { text: String, position: usize },

    /// NaN and infinities have no literal form in the grammar.
    #[error("Number {0} cannot be written in a command")]
    NonFiniteNumber(f64),

    /// Something other than whitespace follows the closing `;`.
    #[error("Trailing input at byte {0}")]
    TrailingInput(usize),
}
