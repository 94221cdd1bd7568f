use thiserror::Error;

use crate::serialization::Format;

/// Common error type for fieldpoll components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse config '{source_name}': {message}")]
    ConfigParse {
        source_name: String,
        message: String,
    },

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("Failed to encode payload as {format:?}: {message}")]
    Encode { format: Format, message: String },

    #[error("Failed to decode payload as {format:?}: {message}")]
    Decode { format: Format, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key expression: {0}")]
    KeyExpr(String),
}

impl Error {
    pub(crate) fn encode(format: Format, err: impl std::fmt::Display) -> Self {
        Error::Encode {
            format,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(format: Format, err: impl std::fmt::Display) -> Self {
        Error::Decode {
            format,
            message: err.to_string(),
        }
    }
}

/// Result type alias using fieldpoll's Error.
pub type Result<T> = std::result::Result<T, Error>;
