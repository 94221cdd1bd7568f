use std::sync::Arc;

use fieldpoll_agent_snmp::{PROGRAM, SnmpAgentConfig, SnmpClientFactory};
use fieldpoll_framework::{ClientFactory, Protocol, run_agent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_agent::<SnmpAgentConfig, _>(PROGRAM, "snmp.json5", Protocol::Snmp, |config| {
        let factory: Arc<dyn ClientFactory> = Arc::new(SnmpClientFactory::new(&config.snmp));
        Ok(factory)
    })
    .await
}
