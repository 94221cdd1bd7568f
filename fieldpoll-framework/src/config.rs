//! Configuration traits and shared agent settings.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fieldpoll_common::{Format, from_tree, load_tree, parse_tree};

use crate::error::{AgentError, Result};
use crate::identity::{AUTO_HOSTNAME, resolve_hostname};
use crate::resolver::{DeviceTargets, PollLayout, ResolveError, TargetResolver};
use crate::{LoggingConfig, ZenohConfig};

/// Settings every agent shares, under the `agent` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Hostname reported in payloads ("auto" = system hostname).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Seconds between the starts of two collection runs.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Key expression prefix payloads are forwarded under.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Payload wire format.
    #[serde(default)]
    pub serialization: Format,

    /// Devices polled at the same time (1 = sequential).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Undelivered payloads kept for retry.
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,
}

fn default_hostname() -> String {
    AUTO_HOSTNAME.to_string()
}

fn default_polling_interval() -> u64 {
    300
}

fn default_key_prefix() -> String {
    fieldpoll_common::KEY_PREFIX.to_string()
}

fn default_workers() -> usize {
    1
}

fn default_cache_limit() -> usize {
    100
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            polling_interval_secs: default_polling_interval(),
            key_prefix: default_key_prefix(),
            serialization: Format::default(),
            workers: default_workers(),
            cache_limit: default_cache_limit(),
        }
    }
}

impl AgentSettings {
    /// Validate the shared settings.
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval_secs == 0 {
            return Err(AgentError::validation(
                "agent.polling_interval_secs must be greater than 0",
            ));
        }
        if self.workers == 0 {
            return Err(AgentError::validation("agent.workers must be greater than 0"));
        }
        if self.key_prefix.trim_matches('/').is_empty() {
            return Err(AgentError::validation("agent.key_prefix cannot be empty"));
        }
        Ok(())
    }

    /// The polling interval as a duration.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// The hostname to report, resolving "auto".
    pub fn resolved_hostname(&self) -> String {
        resolve_hostname(&self.hostname)
    }
}

/// Trait for agent configuration types.
///
/// The typed view covers the agent's own sections; `polling_groups` stays in
/// the raw tree and is resolved leniently by [`TargetResolver`].
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Deserialize)]
/// pub struct MyAgentConfig {
///     #[serde(default)]
///     pub zenoh: ZenohConfig,
///     #[serde(default)]
///     pub logging: LoggingConfig,
///     #[serde(default)]
///     pub agent: AgentSettings,
/// }
///
/// impl AgentConfig for MyAgentConfig {
///     fn zenoh(&self) -> &ZenohConfig { &self.zenoh }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
///     fn agent(&self) -> &AgentSettings { &self.agent }
///     fn layout(&self) -> PollLayout {
///         PollLayout::new("ip_devices", ["analog_values"])
///     }
/// }
/// ```
pub trait AgentConfig: Sized + DeserializeOwned {
    /// Get the Zenoh configuration.
    fn zenoh(&self) -> &ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the shared agent settings.
    fn agent(&self) -> &AgentSettings;

    /// Polling-group keys this agent's protocol understands.
    fn layout(&self) -> PollLayout;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add protocol checks,
    /// keeping the shared ones.
    fn validate(&self) -> Result<()> {
        self.agent().validate()
    }

    /// Load configuration from a JSON5 file.
    fn load(path: impl AsRef<Path>) -> Result<ConfigDocument<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AgentError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        ConfigDocument::from_tree(load_tree(path)?)
    }

    /// Parse configuration from a JSON5 string.
    fn parse(content: &str) -> Result<ConfigDocument<Self>> {
        ConfigDocument::from_tree(parse_tree(content)?)
    }
}

/// A loaded configuration: the typed view plus the tree it came from.
#[derive(Debug, Clone)]
pub struct ConfigDocument<C> {
    pub config: C,
    pub tree: Value,
}

impl<C: AgentConfig> ConfigDocument<C> {
    fn from_tree(tree: Value) -> Result<Self> {
        let config: C = from_tree(&tree).map_err(|e| AgentError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(Self { config, tree })
    }

    /// Resolve the polling groups into per-device targets.
    pub fn resolve_targets(&self) -> std::result::Result<DeviceTargets, ResolveError> {
        TargetResolver::new(&self.tree, self.config.layout()).resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        zenoh: ZenohConfig,
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        agent: AgentSettings,
    }

    impl AgentConfig for TestConfig {
        fn zenoh(&self) -> &ZenohConfig {
            &self.zenoh
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn agent(&self) -> &AgentSettings {
            &self.agent
        }

        fn layout(&self) -> PollLayout {
            PollLayout::new("ip_devices", ["analog_values"])
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(AgentError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_defaults() {
        let doc = TestConfig::parse("{ polling_groups: [] }").unwrap();
        let agent = doc.config.agent();

        assert_eq!(agent.hostname, AUTO_HOSTNAME);
        assert_eq!(agent.polling_interval(), Duration::from_secs(300));
        assert_eq!(agent.key_prefix, "fieldpoll");
        assert_eq!(agent.workers, 1);
        assert_eq!(agent.cache_limit, 100);
        assert_eq!(agent.serialization, Format::Json);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = TestConfig::parse("{ agent: { polling_interval_secs: 0 } }");
        assert!(matches!(result, Err(AgentError::ConfigValidation(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = TestConfig::parse("{ agent: { workers: 0 } }");
        assert!(matches!(result, Err(AgentError::ConfigValidation(_))));
    }

    #[test]
    fn test_load_and_resolve_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                // BACnet-style analog values
                agent: {{ hostname: "edge-7", polling_interval_secs: 60 }},
                polling_groups: [
                    {{ ip_devices: ["127.0.0.60"], analog_values: [123, 345], multiplier: 0.5 }},
                ],
            }}"#
        )
        .unwrap();

        let doc = TestConfig::load(file.path()).unwrap();
        assert_eq!(doc.config.agent().resolved_hostname(), "edge-7");

        let targets = doc.resolve_targets().unwrap();
        let points: Vec<u32> = targets["127.0.0.60"].iter().map(|t| t.address).collect();
        assert_eq!(points, vec![123, 345]);
        assert!(targets["127.0.0.60"].iter().all(|t| t.scale == 0.5));
    }

    #[test]
    fn test_missing_polling_groups_surfaces_on_resolve() {
        let doc = TestConfig::parse("{ agent: { hostname: \"gw\" } }").unwrap();
        assert_eq!(doc.resolve_targets(), Err(ResolveError::MissingPollingGroups));
    }
}
