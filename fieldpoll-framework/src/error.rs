//! Error types for the agent framework.

use thiserror::Error;

use crate::resolver::ResolveError;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that reach the agent's process boundary.
///
/// Per-target and per-device faults never show up here; they are absorbed
/// by the poller and the collection run.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Polling groups could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Payload serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Forwarding error.
    #[error("Failed to forward to {key}: {message}")]
    Forward { key: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<fieldpoll_common::Error> for AgentError {
    fn from(err: fieldpoll_common::Error) -> Self {
        use fieldpoll_common::Error as Common;

        match err {
            Common::ConfigParse { .. } => Self::ConfigParse(err.to_string()),
            Common::Config(msg) => Self::Config(msg),
            Common::Zenoh(e) => Self::ZenohConnection(e.to_string()),
            Common::Encode { .. } | Common::Decode { .. } => Self::Serialization(err.to_string()),
            Common::Io(e) => Self::Io(e),
            Common::KeyExpr(msg) => Self::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_is_transparent() {
        let err = AgentError::from(ResolveError::MissingPollingGroups);
        assert_eq!(
            err.to_string(),
            "required configuration section 'polling_groups' is missing"
        );
    }

    #[test]
    fn test_common_parse_error_maps() {
        let err = AgentError::from(fieldpoll_common::Error::ConfigParse {
            source_name: "modbus.json5".to_string(),
            message: "unexpected end".to_string(),
        });
        assert!(matches!(err, AgentError::ConfigParse(_)));
        assert!(err.to_string().contains("modbus.json5"));
    }
}
