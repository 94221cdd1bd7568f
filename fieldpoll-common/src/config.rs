use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};

/// Zenoh connection used to reach the central collection server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,
}

fn default_mode() -> String {
    "client".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Read a JSON5 configuration file into an untyped tree.
///
/// The tree is kept around because the polling groups are resolved from it
/// leniently rather than through a typed schema.
pub fn load_tree(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| Error::ConfigParse {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Parse a JSON5 string into an untyped tree.
pub fn parse_tree(content: &str) -> Result<Value> {
    json5::from_str(content).map_err(|e| Error::ConfigParse {
        source_name: "<inline>".to_string(),
        message: e.to_string(),
    })
}

/// Deserialize the typed parts of a configuration from its tree.
///
/// Unknown keys (such as `polling_groups`) are ignored by the typed view.
pub fn from_tree<T: for<'de> Deserialize<'de>>(tree: &Value) -> Result<T> {
    T::deserialize(tree).map_err(|e| Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sections {
        #[serde(default)]
        zenoh: ZenohConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_parse_sections() {
        let tree = parse_tree(
            r#"
            {
                zenoh: {
                    mode: "client",
                    connect: ["tcp/collector.local:7447"],
                },
                logging: {
                    level: "debug",
                    format: "json",
                },
                polling_groups: [],
            }
            "#,
        )
        .unwrap();

        let sections: Sections = from_tree(&tree).unwrap();
        assert_eq!(sections.zenoh.mode, "client");
        assert_eq!(sections.zenoh.connect, vec!["tcp/collector.local:7447"]);
        assert_eq!(sections.logging.level, "debug");
        assert_eq!(sections.logging.format, LogFormat::Json);
        assert!(tree.get("polling_groups").is_some());
    }

    #[test]
    fn test_default_sections() {
        let tree = parse_tree("{}").unwrap();
        let sections: Sections = from_tree(&tree).unwrap();

        assert_eq!(sections.zenoh.mode, "client");
        assert!(sections.zenoh.connect.is_empty());
        assert_eq!(sections.logging.level, "info");
        assert_eq!(sections.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_tree("{ unterminated: ").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_tree("/nonexistent/fieldpoll.json5").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
