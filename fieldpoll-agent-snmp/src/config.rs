use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fieldpoll_framework::{
    AgentConfig, AgentError, AgentSettings, LoggingConfig, PollLayout, ZenohConfig,
};

use crate::oid::parse_oid;

/// Polling-group key listing the devices of a group.
pub const DEVICE_KEY: &str = "ip_devices";

/// IF-MIB `ifTable` columns polled when none are configured.
pub const IF_MIB_COLUMNS: [(&str, &str); 8] = [
    ("ifDescr", "1.3.6.1.2.1.2.2.1.2"),
    ("ifOperStatus", "1.3.6.1.2.1.2.2.1.8"),
    ("ifInOctets", "1.3.6.1.2.1.2.2.1.10"),
    ("ifInDiscards", "1.3.6.1.2.1.2.2.1.13"),
    ("ifInErrors", "1.3.6.1.2.1.2.2.1.14"),
    ("ifOutOctets", "1.3.6.1.2.1.2.2.1.16"),
    ("ifOutDiscards", "1.3.6.1.2.1.2.2.1.19"),
    ("ifOutErrors", "1.3.6.1.2.1.2.2.1.20"),
];

/// Root configuration for the SNMP agent.
///
/// Polling groups list interface indexes per column name, e.g.
/// `{ ip_devices: ["switch01"], ifInOctets: [1, 2, 3] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnmpAgentConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shared agent settings.
    #[serde(default)]
    pub agent: AgentSettings,

    /// SNMP-specific settings.
    #[serde(default)]
    pub snmp: SnmpSettings,
}

/// SNMP transport and table settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnmpSettings {
    /// UDP port (default: 161).
    #[serde(default = "default_snmp_port")]
    pub port: u16,

    /// SNMP community string.
    #[serde(default = "default_community")]
    pub community: String,

    /// SNMP version.
    #[serde(default)]
    pub version: SnmpVersion,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Column name to table column OID.
    #[serde(default = "default_columns")]
    pub columns: BTreeMap<String, String>,
}

fn default_snmp_port() -> u16 {
    161
}

fn default_community() -> String {
    "public".to_string()
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_columns() -> BTreeMap<String, String> {
    IF_MIB_COLUMNS
        .iter()
        .map(|(name, oid)| (name.to_string(), oid.to_string()))
        .collect()
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            port: default_snmp_port(),
            community: default_community(),
            version: SnmpVersion::default(),
            timeout_ms: default_timeout_ms(),
            columns: default_columns(),
        }
    }
}

impl SnmpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2c")]
    V2c,
}

impl AgentConfig for SnmpAgentConfig {
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
        PollLayout::new(DEVICE_KEY, self.snmp.columns.keys())
    }

    fn validate(&self) -> fieldpoll_framework::Result<()> {
        self.agent.validate()?;

        if self.snmp.timeout_ms == 0 {
            return Err(AgentError::validation(
                "snmp.timeout_ms must be greater than 0",
            ));
        }

        if self.snmp.columns.is_empty() {
            return Err(AgentError::validation("snmp.columns cannot be empty"));
        }

        for (name, oid) in &self.snmp.columns {
            if name == DEVICE_KEY {
                return Err(AgentError::validation(format!(
                    "snmp.columns cannot use the reserved name '{}'",
                    DEVICE_KEY
                )));
            }
            parse_oid(oid).map_err(|e| {
                AgentError::validation(format!("snmp.columns.{}: {}", name, e))
            })?;
        }

        Ok(())
    }
}
