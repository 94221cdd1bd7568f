//! Protocol client capability consumed by the device poller.
//!
//! Each protocol (Modbus, SNMP, BACnet) provides an adapter implementing
//! [`ProtocolClient`] and a [`ClientFactory`] that opens it per device. Adapters
//! map every library error into the closed [`ClientFault`] set, so the poller
//! never sees protocol-specific error types.

use async_trait::async_trait;
use thiserror::Error;

use crate::resolver::PollTarget;

/// Why a single point (or a whole device) could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientFault {
    /// The device did not answer within the client's timeout.
    #[error("no response from device (timeout)")]
    Timeout,

    /// The device does not know the requested object or address.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// Any other protocol or transport failure.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientFault {
    /// Short label used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            ClientFault::Timeout => "timeout",
            ClientFault::UnknownTarget(_) => "unknown_target",
            ClientFault::Protocol(_) => "protocol",
        }
    }
}

/// Raw value returned by a protocol client, before scaling.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric interpretation of the value.
    ///
    /// Text that parses as a finite float counts as numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => Self::parse_number(s),
        }
    }

    pub(crate) fn parse_number(text: &str) -> Option<f64> {
        text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<u16> for RawValue {
    fn from(v: u16) -> Self {
        RawValue::Number(f64::from(v))
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

/// Outcome of reading one address of a run.
pub type ReadOutcome = (u32, Result<RawValue, ClientFault>);

/// A connected client for one device.
#[async_trait]
pub trait ProtocolClient: Send {
    /// Read the value at one address of `target`.
    async fn read(&mut self, target: &PollTarget, address: u32) -> Result<RawValue, ClientFault>;

    /// Read every address of a run.
    ///
    /// The default loops over [`read`](Self::read). Adapters that can fetch a
    /// run in one request override this and report the request's fault for
    /// every address it covered.
    async fn read_run(&mut self, target: &PollTarget) -> Vec<ReadOutcome> {
        let mut outcomes = Vec::with_capacity(target.length as usize);
        for address in target.addresses() {
            let outcome = self.read(target, address).await;
            outcomes.push((address, outcome));
        }
        outcomes
    }
}

/// Opens protocol clients, one per device and polling cycle.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Connect to `device`.
    async fn connect(&self, device: &str) -> Result<Box<dyn ProtocolClient>, ClientFault>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_numeric() {
        assert_eq!(RawValue::Number(2.5).as_number(), Some(2.5));
        assert_eq!(RawValue::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(RawValue::from(7u16).as_number(), Some(7.0));
        assert_eq!(RawValue::from("OK").as_number(), None);
        assert_eq!(RawValue::from("NaN").as_number(), None);
        assert_eq!(RawValue::from("inf").as_number(), None);
    }

    #[test]
    fn test_fault_labels() {
        assert_eq!(ClientFault::Timeout.label(), "timeout");
        assert_eq!(
            ClientFault::UnknownTarget("analogValue 3".to_string()).to_string(),
            "unknown target: analogValue 3"
        );
        assert_eq!(ClientFault::Protocol("reset".to_string()).label(), "protocol");
    }
}
