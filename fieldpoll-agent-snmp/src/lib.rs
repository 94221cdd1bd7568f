//! fieldpoll agent for SNMP.
//!
//! Polls interface table cells (IF-MIB columns by default) of the devices
//! listed in `polling_groups`. Each configured column name is a point kind
//! and each address is a row index, read with GET on `<column>.<index>`.

pub mod client;
pub mod config;
pub mod oid;

pub use client::{SnmpClient, SnmpClientFactory, convert_value, status_fault};
pub use config::{IF_MIB_COLUMNS, SnmpAgentConfig, SnmpSettings, SnmpVersion};

/// Program name reported in payloads and key expressions.
pub const PROGRAM: &str = "fieldpoll-agent-snmp";
