//! SNMP protocol client reading table cells with GET.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snmp2::snmp::{ERRSTATUS_NOERROR, ERRSTATUS_NOSUCHNAME};
use snmp2::{AsyncSession, Oid, Pdu, Value};
use tokio::time::timeout;

use fieldpoll_framework::{ClientFactory, ClientFault, PollTarget, ProtocolClient, RawValue};

use crate::config::{SnmpSettings, SnmpVersion};
use crate::oid::{instance_oid, oid_to_string};

/// Convert a varbind value into a raw point value.
///
/// Missing objects are [`ClientFault::UnknownTarget`]; value types with no
/// point representation are [`ClientFault::Protocol`].
pub fn convert_value(value: &Value) -> Result<RawValue, ClientFault> {
    match value {
        Value::Integer(n) => Ok(RawValue::Number(*n as f64)),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
            Ok(RawValue::Number(f64::from(*n)))
        }
        Value::Counter64(n) => Ok(RawValue::Number(*n as f64)),
        Value::OctetString(bytes) => Ok(RawValue::Text(
            String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
        )),
        Value::ObjectIdentifier(oid) => Ok(RawValue::Text(oid_to_string(oid))),
        Value::IpAddress(ip) => Ok(RawValue::Text(format!(
            "{}.{}.{}.{}",
            ip[0], ip[1], ip[2], ip[3]
        ))),
        Value::NoSuchObject => Err(ClientFault::UnknownTarget("no such object".to_string())),
        Value::NoSuchInstance => Err(ClientFault::UnknownTarget("no such instance".to_string())),
        Value::EndOfMibView => Err(ClientFault::UnknownTarget("end of MIB view".to_string())),
        _ => Err(ClientFault::Protocol("unsupported value type".to_string())),
    }
}

/// Map a non-zero response error status to a fault.
///
/// SNMPv1 agents report a missing object as `noSuchName` rather than with a
/// `noSuchObject` value.
pub fn status_fault(error_status: u32) -> Option<ClientFault> {
    match error_status {
        ERRSTATUS_NOERROR => None,
        ERRSTATUS_NOSUCHNAME => Some(ClientFault::UnknownTarget("no such name".to_string())),
        status => Some(ClientFault::Protocol(format!("error status {}", status))),
    }
}

/// Extract the value of a GET response for `oid`.
fn check_response(response: Pdu<'_>, oid: &Oid<'_>) -> Result<RawValue, ClientFault> {
    if let Some(fault) = status_fault(response.error_status) {
        return Err(fault);
    }

    let Some((name, value)) = response.varbinds.into_iter().next() else {
        return Err(ClientFault::Protocol("empty response".to_string()));
    };

    if name.as_bytes() != oid.as_bytes() {
        return Err(ClientFault::Protocol(format!(
            "response for {} instead of {}",
            oid_to_string(&name),
            oid_to_string(oid)
        )));
    }

    convert_value(&value)
}

async fn open_session(
    version: SnmpVersion,
    addr: SocketAddr,
    community: &[u8],
) -> std::io::Result<AsyncSession> {
    match version {
        SnmpVersion::V1 => AsyncSession::new_v1(addr, community, 0).await,
        SnmpVersion::V2c => AsyncSession::new_v2c(addr, community, 0).await,
    }
}

/// Opens an SNMP session per device.
#[derive(Debug, Clone)]
pub struct SnmpClientFactory {
    port: u16,
    community: String,
    version: SnmpVersion,
    timeout: Duration,
    columns: Arc<BTreeMap<String, String>>,
}

impl SnmpClientFactory {
    pub fn new(settings: &SnmpSettings) -> Self {
        Self {
            port: settings.port,
            community: settings.community.clone(),
            version: settings.version,
            timeout: settings.timeout(),
            columns: Arc::new(settings.columns.clone()),
        }
    }

    async fn socket_addr(&self, device: &str) -> Result<SocketAddr, ClientFault> {
        if let Ok(addr) = device.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host((device, self.port))
            .await
            .map_err(|e| ClientFault::Protocol(format!("cannot resolve {}: {}", device, e)))?;

        addrs
            .next()
            .ok_or_else(|| ClientFault::Protocol(format!("no address for {}", device)))
    }
}

#[async_trait]
impl ClientFactory for SnmpClientFactory {
    async fn connect(&self, device: &str) -> Result<Box<dyn ProtocolClient>, ClientFault> {
        let addr = self.socket_addr(device).await?;

        let session = open_session(self.version, addr, self.community.as_bytes())
            .await
            .map_err(|e| ClientFault::Protocol(format!("failed to open SNMP session: {}", e)))?;

        tracing::debug!(device = %device, addr = %addr, version = ?self.version, "SNMP session ready");

        Ok(Box::new(SnmpClient {
            session,
            addr,
            version: self.version,
            community: self.community.clone(),
            timeout: self.timeout,
            columns: Arc::clone(&self.columns),
        }))
    }
}

/// An SNMP session to one device.
pub struct SnmpClient {
    session: AsyncSession,
    addr: SocketAddr,
    version: SnmpVersion,
    community: String,
    timeout: Duration,
    columns: Arc<BTreeMap<String, String>>,
}

impl SnmpClient {
    /// Replace the session after a timeout.
    ///
    /// A cancelled GET leaves its request id unconsumed, so a late answer on
    /// the old socket would match the next request.
    async fn reopen(&mut self) {
        match open_session(self.version, self.addr, self.community.as_bytes()).await {
            Ok(session) => self.session = session,
            Err(e) => {
                tracing::warn!(addr = %self.addr, error = %e, "Failed to reopen SNMP session");
            }
        }
    }
}

#[async_trait]
impl ProtocolClient for SnmpClient {
    async fn read(&mut self, target: &PollTarget, address: u32) -> Result<RawValue, ClientFault> {
        let column = self
            .columns
            .get(&target.kind)
            .ok_or_else(|| ClientFault::UnknownTarget(format!("column {}", target.kind)))?;
        let oid = instance_oid(column, address).map_err(|e| ClientFault::Protocol(e.to_string()))?;

        let outcome = match timeout(self.timeout, self.session.get(&oid)).await {
            Ok(Ok(response)) => Some(check_response(response, &oid)),
            Ok(Err(e)) => Some(Err(ClientFault::Protocol(format!("SNMP GET error: {}", e)))),
            Err(_) => None,
        };

        match outcome {
            Some(result) => result,
            None => {
                self.reopen().await;
                Err(ClientFault::Timeout)
            }
        }
    }
}
