//! fieldpoll agent for Modbus TCP.
//!
//! Polls input and holding registers of the devices listed in
//! `polling_groups` and forwards one payload per cycle to Zenoh.
//!
//! # Configuration
//!
//! ```text
//! polling_groups: [
//!     { ip_devices: ["10.0.0.1"], input_registers: [1, 2, 3, 10], unit: 2, multiplier: 0.1 },
//! ]
//! ```
//!
//! Contiguous registers are read with one request per run (at most 125
//! registers), using `unit` as the Modbus slave id.

pub mod client;
pub mod config;

pub use client::{ModbusClient, ModbusClientFactory};
pub use config::{ModbusAgentConfig, ModbusSettings};

/// Program name reported in payloads and key expressions.
pub const PROGRAM: &str = "fieldpoll-agent-modbus";
