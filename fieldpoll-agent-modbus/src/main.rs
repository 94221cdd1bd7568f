//! fieldpoll agent for Modbus TCP.

use std::sync::Arc;

use fieldpoll_agent_modbus::{ModbusAgentConfig, ModbusClientFactory, PROGRAM};
use fieldpoll_framework::{ClientFactory, Protocol, run_agent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_agent::<ModbusAgentConfig, _>(PROGRAM, "modbus.json5", Protocol::Modbus, |config| {
        let factory: Arc<dyn ClientFactory> = Arc::new(ModbusClientFactory::new(&config.modbus));
        Ok(factory)
    })
    .await
}
