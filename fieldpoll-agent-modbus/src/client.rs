//! Modbus TCP protocol client.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio_modbus::ExceptionCode;
use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;

use fieldpoll_framework::{
    ClientFactory, ClientFault, PollTarget, ProtocolClient, RawValue, ReadOutcome,
};

use crate::config::{HOLDING_REGISTERS, INPUT_REGISTERS, ModbusSettings};

/// Most registers a single read request may ask for.
pub const MAX_REGISTERS_PER_REQUEST: u32 = 125;

/// Register table a point kind reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    Input,
    Holding,
}

impl RegisterKind {
    /// Map a polling-group key to its register table.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            INPUT_REGISTERS => Some(RegisterKind::Input),
            HOLDING_REGISTERS => Some(RegisterKind::Holding),
            _ => None,
        }
    }
}

/// Split a run into `(start, count)` requests of at most
/// [`MAX_REGISTERS_PER_REQUEST`] registers.
pub fn request_chunks(address: u32, length: u32) -> Vec<(u32, u32)> {
    let end = u64::from(address) + u64::from(length);
    let mut chunks = Vec::new();
    let mut start = u64::from(address);

    while start < end {
        let count = (end - start).min(u64::from(MAX_REGISTERS_PER_REQUEST));
        // start < end <= u32::MAX + 1 and count <= 125, so both fit.
        chunks.push((start as u32, count as u32));
        start += count;
    }

    chunks
}

/// Map a Modbus exception response to a fault.
pub fn exception_fault(exception: ExceptionCode) -> ClientFault {
    match exception {
        ExceptionCode::IllegalDataAddress => {
            ClientFault::UnknownTarget("illegal data address".to_string())
        }
        other => ClientFault::Protocol(format!("exception response: {:?}", other)),
    }
}

/// The same fault for every address of a range.
fn fail_range(start: u32, count: u32, fault: &ClientFault) -> Vec<ReadOutcome> {
    (0..count)
        .map(|offset| (start + offset, Err(fault.clone())))
        .collect()
}

/// Convert a register range to Modbus wire types, if it fits the 16-bit space.
fn wire_range(start: u32, count: u32) -> Option<(u16, u16)> {
    if count == 0 || u64::from(start) + u64::from(count) - 1 > u64::from(u16::MAX) {
        return None;
    }
    Some((u16::try_from(start).ok()?, u16::try_from(count).ok()?))
}

/// Opens a Modbus TCP connection per device.
#[derive(Debug, Clone)]
pub struct ModbusClientFactory {
    port: u16,
    timeout: Duration,
}

impl ModbusClientFactory {
    pub fn new(settings: &ModbusSettings) -> Self {
        Self {
            port: settings.port,
            timeout: settings.timeout(),
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
impl ClientFactory for ModbusClientFactory {
    async fn connect(&self, device: &str) -> Result<Box<dyn ProtocolClient>, ClientFault> {
        let addr = self.socket_addr(device).await?;

        let ctx = tokio::time::timeout(self.timeout, tcp::connect(addr))
            .await
            .map_err(|_| ClientFault::Timeout)?
            .map_err(|e| ClientFault::Protocol(format!("connection failed: {}", e)))?;

        tracing::debug!(device = %device, addr = %addr, "Connected to Modbus device");

        Ok(Box::new(ModbusClient {
            ctx,
            addr,
            slave: Slave::tcp_device(),
            timeout: self.timeout,
        }))
    }
}

/// A connected Modbus TCP client for one device.
pub struct ModbusClient {
    ctx: Context,
    addr: SocketAddr,
    slave: Slave,
    timeout: Duration,
}

impl ModbusClient {
    /// Replace the connection after a timeout.
    ///
    /// The late response would otherwise be read as the answer to the next
    /// request and fail its transaction header check.
    async fn reconnect(&mut self) {
        match tokio::time::timeout(self.timeout, tcp::connect_slave(self.addr, self.slave)).await {
            Ok(Ok(ctx)) => self.ctx = ctx,
            Ok(Err(e)) => {
                tracing::warn!(addr = %self.addr, error = %e, "Failed to reconnect to Modbus device");
            }
            Err(_) => {
                tracing::warn!(addr = %self.addr, "Timed out reconnecting to Modbus device");
            }
        }
    }

    async fn read_registers(
        &mut self,
        kind: RegisterKind,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, ClientFault> {
        let ctx = &mut self.ctx;
        let request = async move {
            match kind {
                RegisterKind::Input => ctx.read_input_registers(start, count).await,
                RegisterKind::Holding => ctx.read_holding_registers(start, count).await,
            }
        };

        let outcome = tokio::time::timeout(self.timeout, request).await;
        match outcome {
            Err(_) => {
                self.reconnect().await;
                Err(ClientFault::Timeout)
            }
            Ok(Err(e)) => Err(ClientFault::Protocol(e.to_string())),
            Ok(Ok(Err(exception))) => Err(exception_fault(exception)),
            Ok(Ok(Ok(words))) => Ok(words),
        }
    }

    /// Select the unit and register table for a target.
    fn prepare(&mut self, target: &PollTarget) -> Result<RegisterKind, ClientFault> {
        let kind = RegisterKind::from_kind(&target.kind)
            .ok_or_else(|| ClientFault::UnknownTarget(format!("register kind {}", target.kind)))?;
        let unit = u8::try_from(target.unit)
            .map_err(|_| ClientFault::UnknownTarget(format!("unit {}", target.unit)))?;

        self.slave = Slave(unit);
        self.ctx.set_slave(self.slave);
        Ok(kind)
    }
}

#[async_trait]
impl ProtocolClient for ModbusClient {
    async fn read(&mut self, target: &PollTarget, address: u32) -> Result<RawValue, ClientFault> {
        let kind = self.prepare(target)?;
        let (start, count) = wire_range(address, 1)
            .ok_or_else(|| ClientFault::UnknownTarget(format!("register {}", address)))?;

        let words = self.read_registers(kind, start, count).await?;
        words
            .first()
            .map(|&word| RawValue::from(word))
            .ok_or_else(|| ClientFault::Protocol("empty response".to_string()))
    }

    async fn read_run(&mut self, target: &PollTarget) -> Vec<ReadOutcome> {
        let kind = match self.prepare(target) {
            Ok(kind) => kind,
            Err(fault) => return fail_range(target.address, target.length, &fault),
        };

        let mut outcomes = Vec::with_capacity(target.length as usize);

        for (start, count) in request_chunks(target.address, target.length) {
            let Some((wire_start, wire_count)) = wire_range(start, count) else {
                let fault = ClientFault::UnknownTarget(format!("registers {}+{}", start, count));
                outcomes.extend(fail_range(start, count, &fault));
                continue;
            };

            match self.read_registers(kind, wire_start, wire_count).await {
                Ok(words) => {
                    for offset in 0..count {
                        let address = start + offset;
                        let outcome = match words.get(offset as usize) {
                            Some(&word) => Ok(RawValue::from(word)),
                            None => Err(ClientFault::Protocol("short response".to_string())),
                        };
                        outcomes.push((address, outcome));
                    }
                }
                Err(fault) => outcomes.extend(fail_range(start, count, &fault)),
            }
        }

        outcomes
    }
}
