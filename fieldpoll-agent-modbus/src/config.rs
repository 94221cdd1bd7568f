//! Configuration for the Modbus agent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use fieldpoll_framework::{
    AgentConfig, AgentError, AgentSettings, LoggingConfig, PollLayout, ZenohConfig,
};

/// Polling-group key listing the devices of a group.
pub const DEVICE_KEY: &str = "ip_devices";

/// Polling-group key for input registers (function code 4).
pub const INPUT_REGISTERS: &str = "input_registers";

/// Polling-group key for holding registers (function code 3).
pub const HOLDING_REGISTERS: &str = "holding_registers";

/// Complete agent configuration.
///
/// `polling_groups` is not part of the typed view; it is resolved from the
/// raw configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModbusAgentConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shared agent settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Modbus-specific settings
    #[serde(default)]
    pub modbus: ModbusSettings,
}

/// Modbus TCP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusSettings {
    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Per-request timeout in milliseconds, also used for connecting
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for ModbusSettings {
    fn default() -> Self {
        Self {
            port: default_modbus_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ModbusSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AgentConfig for ModbusAgentConfig {
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
        PollLayout::new(DEVICE_KEY, [INPUT_REGISTERS, HOLDING_REGISTERS])
    }

    fn validate(&self) -> fieldpoll_framework::Result<()> {
        self.agent.validate()?;

        if self.modbus.port == 0 {
            return Err(AgentError::validation("modbus.port cannot be 0"));
        }
        if self.modbus.timeout_ms == 0 {
            return Err(AgentError::validation(
                "modbus.timeout_ms must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let doc = ModbusAgentConfig::parse(
            r#"{
                polling_groups: [
                    { ip_devices: ["10.0.0.1"], input_registers: [1, 2, 3, 10], unit: 2 },
                ],
            }"#,
        )
        .unwrap();

        assert_eq!(doc.config.modbus, ModbusSettings::default());
        assert_eq!(doc.config.modbus.timeout(), Duration::from_secs(1));
        assert_eq!(doc.config.zenoh.mode, "client");
        assert_eq!(doc.resolve_targets().unwrap()["10.0.0.1"].len(), 2);
    }

    #[test]
    fn test_parse_full_config() {
        let doc = ModbusAgentConfig::parse(
            r#"{
                zenoh: { mode: "peer", connect: ["tcp/10.1.0.1:7447"] },
                logging: { level: "debug" },
                agent: { hostname: "plant-gw", polling_interval_secs: 30, serialization: "cbor" },
                modbus: { port: 5020, timeout_ms: 250 },
                polling_groups: [
                    { ip_devices: ["10.0.0.1"], holding_registers: [40001, 40002] },
                    { ip_devices: ["10.0.0.2"], input_registers: [7], multiplier: 0.1 },
                ],
            }"#,
        )
        .unwrap();

        assert_eq!(doc.config.modbus.port, 5020);
        assert_eq!(doc.config.agent.polling_interval_secs, 30);
        assert_eq!(doc.config.logging.level, "debug");

        let targets = doc.resolve_targets().unwrap();
        assert_eq!(targets["10.0.0.1"][0].kind, HOLDING_REGISTERS);
        assert_eq!(targets["10.0.0.1"][0].length, 2);
        assert_eq!(targets["10.0.0.2"][0].scale, 0.1);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ModbusAgentConfig::parse("{ modbus: { timeout_ms: 0 }, polling_groups: [] }");
        assert!(matches!(result, Err(AgentError::ConfigValidation(_))));
    }

    #[test]
    fn test_other_kinds_ignored() {
        let doc = ModbusAgentConfig::parse(
            r#"{ polling_groups: [{ ip_devices: ["10.0.0.1"], coils: [1, 2] }] }"#,
        )
        .unwrap();
        assert!(doc.resolve_targets().unwrap().is_empty());
    }
}
