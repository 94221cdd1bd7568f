//! fieldpoll agent framework
//!
//! The polling-and-assembly engine shared by every fieldpoll collection agent.
//!
//! # Overview
//!
//! A cycle flows through these pieces:
//! - [`TargetResolver`] turns the `polling_groups` configuration into
//!   [`DeviceTargets`], using [`compact`] to merge addresses into runs
//! - [`DevicePoller`] reads one device's targets through a [`ProtocolClient`],
//!   isolating per-point faults
//! - [`CollectionRun`] polls every device and assembles a `CollectionPayload`
//! - [`SchedulingLoop`] repeats the run each interval and hands payloads to a
//!   [`Forwarder`]
//!
//! Around them, [`AgentConfig`], [`AgentArgs`] and [`AgentRunner`] handle
//! configuration, the command line, and the process lifecycle.
//!
//! # Protocols
//!
//! Modbus TCP and SNMP agents ship in `fieldpoll-agent-modbus` and
//! `fieldpoll-agent-snmp`. [`Protocol::Bacnet`] is recognised in payloads and
//! metric names, but no BACnet client is bundled: a BACnet agent supplies its
//! own [`ClientFactory`] to [`run_agent`].
//!
//! # Example
//!
//! ```ignore
//! use fieldpoll_framework::{Protocol, run_agent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_agent::<MyAgentConfig, _>("myagent", "myagent.json5", Protocol::Modbus, |config| {
//!         Ok(Arc::new(MyClientFactory::new(config)))
//!     })
//!     .await
//! }
//! ```

mod args;
mod client;
mod collection;
mod compact;
mod config;
mod error;
mod forwarder;
mod identity;
mod poller;
mod resolver;
mod runner;
mod schedule;

pub use args::AgentArgs;
pub use client::{ClientFactory, ClientFault, ProtocolClient, RawValue, ReadOutcome};
pub use collection::CollectionRun;
pub use compact::compact;
pub use config::{AgentConfig, AgentSettings, ConfigDocument};
pub use error::{AgentError, Result};
pub use forwarder::{Backlog, Forwarder, ZenohForwarder};
pub use identity::{AUTO_HOSTNAME, AgentIdentity, agent_id, resolve_hostname};
pub use poller::{DevicePoll, DevicePoller, SkippedPoint, TAG_KIND, TAG_UNIT, metric_name, transform};
pub use resolver::{
    DEFAULT_SCALE, DEFAULT_UNIT, DeviceTargets, MULTIPLIER_KEY, POLLING_GROUPS_KEY, PollLayout,
    PollTarget, ResolveError, TargetResolver, UNIT_KEY,
};
pub use runner::{AgentRunner, run_agent};
pub use schedule::{CycleReport, SchedulingLoop, sleep_after};

// Re-export commonly used types from fieldpoll-common
pub use fieldpoll_common::{
    CanonicalPoint, CollectionPayload, DevicePointSet, Format, LoggingConfig, PointValue,
    Protocol, ValueKind, ZenohConfig,
};
