//! Agent runner for lifecycle management.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;

use fieldpoll_common::{KeyExprBuilder, LoggingConfig, Protocol, connect, init_tracing};

use crate::AgentArgs;
use crate::client::ClientFactory;
use crate::collection::CollectionRun;
use crate::config::{AgentConfig, ConfigDocument};
use crate::error::{AgentError, Result};
use crate::forwarder::{Forwarder, ZenohForwarder};
use crate::identity::AgentIdentity;
use crate::poller::DevicePoller;
use crate::resolver::DeviceTargets;
use crate::schedule::SchedulingLoop;

/// Runs one collection agent from loaded configuration until Ctrl+C.
///
/// Handles:
/// - Logging initialization (with CLI override)
/// - Resolving polling groups into device targets
/// - Zenoh connection
/// - Building the forwarder and scheduling loop
/// - Graceful shutdown on Ctrl+C
///
/// # Example
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = AgentArgs::parse_with_default("myagent", "myagent.json5");
///     let document = MyAgentConfig::load(&args.config)?;
///
///     let runner = AgentRunner::new_with_args("myagent", document, Some(&args)).await?;
///     let factory = Arc::new(MyClientFactory::new(runner.config()));
///     runner.run(Protocol::Modbus, factory).await?;
///     Ok(())
/// }
/// ```
pub struct AgentRunner<C: AgentConfig> {
    program: String,
    version: String,
    config: C,
    targets: DeviceTargets,
    identity: AgentIdentity,
    session: Arc<zenoh::Session>,
}

impl<C: AgentConfig> AgentRunner<C> {
    /// Create a runner using the configured log level.
    pub async fn new(program: impl Into<String>, document: ConfigDocument<C>) -> Result<Self> {
        Self::new_with_args(program, document, None).await
    }

    /// Create a runner, letting CLI args override the log level.
    ///
    /// Fails if tracing cannot be installed, `polling_groups` is unusable, or
    /// Zenoh is unreachable.
    pub async fn new_with_args(
        program: impl Into<String>,
        document: ConfigDocument<C>,
        args: Option<&AgentArgs>,
    ) -> Result<Self> {
        let program = program.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..document.config.logging().clone()
            },
            None => document.config.logging().clone(),
        };
        init_tracing(&log_config).map_err(|e| AgentError::config(e.to_string()))?;

        tracing::info!(agent = %program, version = %version, "Starting agent");

        let targets = document.resolve_targets()?;
        let point_total: usize = targets
            .values()
            .flatten()
            .map(|t| t.length as usize)
            .sum();
        tracing::info!(
            devices = targets.len(),
            points = point_total,
            "Resolved polling groups"
        );

        let identity = AgentIdentity::new(
            program.clone(),
            document.config.agent().resolved_hostname(),
        );

        let session = Arc::new(
            connect(document.config.zenoh())
                .await
                .map_err(|e| AgentError::ZenohConnection(e.to_string()))?,
        );

        tracing::info!(zid = %session.zid(), "Connected to Zenoh");

        Ok(Self {
            program,
            version,
            config: document.config,
            targets,
            identity,
            session,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn targets(&self) -> &DeviceTargets {
        &self.targets
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Build the Zenoh forwarder for this agent.
    pub async fn forwarder(&self) -> Result<ZenohForwarder> {
        let agent = self.config.agent();
        let keys = KeyExprBuilder::with_prefix(&agent.key_prefix, &self.program);

        ZenohForwarder::new(
            &self.session,
            &keys,
            &self.identity.agent_hostname,
            agent.serialization,
            agent.cache_limit,
        )
        .await
    }

    /// Build the scheduling loop for `protocol` using `factory` for clients.
    pub fn scheduling_loop(
        &self,
        protocol: Protocol,
        factory: Arc<dyn ClientFactory>,
        forwarder: Arc<dyn Forwarder>,
    ) -> SchedulingLoop {
        let agent = self.config.agent();
        let collection = CollectionRun::new(
            self.identity.clone(),
            agent.polling_interval_secs,
            DevicePoller::new(protocol),
        )
        .with_workers(agent.workers);

        SchedulingLoop::new(
            collection,
            self.targets.clone(),
            factory,
            forwarder,
            agent.polling_interval(),
        )
    }

    /// Run the scheduling loop until Ctrl+C, then close the session.
    pub async fn run(self, protocol: Protocol, factory: Arc<dyn ClientFactory>) -> Result<()> {
        let forwarder = Arc::new(self.forwarder().await?);
        tracing::info!(key = %forwarder.key(), format = ?forwarder.format(), "Forwarding payloads");

        let schedule = self.scheduling_loop(protocol, factory, forwarder);

        tracing::info!(agent = %self.program, "Agent running. Press Ctrl+C to stop.");

        tokio::select! {
            _ = schedule.run() => {}
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
                tracing::info!(agent = %self.program, "Received shutdown signal");
            }
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(agent = %self.program, "Goodbye!");

        Ok(())
    }
}

/// Run an agent with minimal boilerplate.
///
/// Parses CLI args, loads the config, builds the client factory from it with
/// `make_factory`, and runs until Ctrl+C.
///
/// # Example
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     run_agent::<MyAgentConfig, _>("myagent", "myagent.json5", Protocol::Modbus, |config| {
///         Ok(Arc::new(MyClientFactory::new(config)))
///     })
///     .await
/// }
/// ```
pub async fn run_agent<C, F>(
    program: &'static str,
    default_config: &'static str,
    protocol: Protocol,
    make_factory: F,
) -> anyhow::Result<()>
where
    C: AgentConfig,
    F: FnOnce(&C) -> anyhow::Result<Arc<dyn ClientFactory>>,
{
    let args = AgentArgs::parse_with_default(program, default_config);
    let document = C::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    let runner = AgentRunner::new_with_args(program, document, Some(&args))
        .await
        .context("starting agent")?;

    let factory = make_factory(runner.config()).context("building protocol client factory")?;

    runner.run(protocol, factory).await.context("running agent")
}
