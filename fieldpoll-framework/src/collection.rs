//! One polling cycle over every configured device.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use fieldpoll_common::{CollectionPayload, DevicePointSet};

use crate::client::ClientFactory;
use crate::identity::AgentIdentity;
use crate::poller::DevicePoller;
use crate::resolver::{DeviceTargets, PollTarget};

/// Assembles a [`CollectionPayload`] from one pass over all devices.
#[derive(Debug, Clone)]
pub struct CollectionRun {
    identity: AgentIdentity,
    polling_interval: u64,
    poller: DevicePoller,
    workers: usize,
}

impl CollectionRun {
    /// Create a sequential collection run.
    pub fn new(identity: AgentIdentity, polling_interval_secs: u64, poller: DevicePoller) -> Self {
        Self {
            identity,
            polling_interval: polling_interval_secs,
            poller,
            workers: 1,
        }
    }

    /// Poll up to `workers` devices at a time. Values below 1 mean sequential.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Poll every device once and assemble the payload.
    ///
    /// Never fails: devices that cannot be reached contribute an empty point
    /// set. Point sets appear in sorted device order regardless of `workers`.
    pub async fn run(
        &self,
        targets: &DeviceTargets,
        factory: &Arc<dyn ClientFactory>,
    ) -> CollectionPayload {
        let mut payload = self.envelope();

        payload.device_point_sets = if self.workers > 1 && targets.len() > 1 {
            self.poll_concurrent(targets, factory).await
        } else {
            self.poll_sequential(targets, factory.as_ref()).await
        };

        tracing::info!(
            devices = payload.device_point_sets.len(),
            points = payload.point_count(),
            "Collection run complete"
        );

        payload
    }

    fn envelope(&self) -> CollectionPayload {
        CollectionPayload {
            agent_id: self.identity.agent_id.clone(),
            agent_program: self.identity.agent_program.clone(),
            agent_hostname: self.identity.agent_hostname.clone(),
            polling_interval: self.polling_interval,
            gateway: self.identity.agent_hostname.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            device_point_sets: Vec::new(),
        }
    }

    async fn poll_sequential(
        &self,
        targets: &DeviceTargets,
        factory: &dyn ClientFactory,
    ) -> Vec<DevicePointSet> {
        let mut sets = Vec::with_capacity(targets.len());
        for (device, device_targets) in targets {
            sets.push(poll_device(self.poller, device, device_targets, factory).await);
        }
        sets
    }

    async fn poll_concurrent(
        &self,
        targets: &DeviceTargets,
        factory: &Arc<dyn ClientFactory>,
    ) -> Vec<DevicePointSet> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (device, device_targets) in targets {
            let semaphore = Arc::clone(&semaphore);
            let factory = Arc::clone(factory);
            let device = device.clone();
            let device_targets = device_targets.clone();
            let poller = self.poller;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                poll_device(poller, &device, &device_targets, factory.as_ref()).await
            });
        }

        let mut finished = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(set) => {
                    finished.insert(set.device.clone(), set);
                }
                Err(e) => tracing::error!(error = %e, "Device poll task failed"),
            }
        }

        targets
            .keys()
            .map(|device| {
                finished
                    .remove(device)
                    .unwrap_or_else(|| DevicePointSet::new(device.as_str()))
            })
            .collect()
    }
}

async fn poll_device(
    poller: DevicePoller,
    device: &str,
    targets: &[PollTarget],
    factory: &dyn ClientFactory,
) -> DevicePointSet {
    match factory.connect(device).await {
        Ok(mut client) => poller.poll(device, targets, client.as_mut()).await,
        Err(fault) => {
            tracing::warn!(
                device = %device,
                fault = fault.label(),
                error = %fault,
                "Could not connect to device, skipping it this cycle"
            );
            DevicePointSet::new(device)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientFault, ProtocolClient, RawValue};
    use async_trait::async_trait;
    use fieldpoll_common::Protocol;

    /// Echoes the address back; connecting to "down" fails.
    struct EchoFactory;

    struct EchoClient;

    #[async_trait]
    impl ProtocolClient for EchoClient {
        async fn read(&mut self, _target: &PollTarget, address: u32) -> Result<RawValue, ClientFault> {
            Ok(RawValue::Number(f64::from(address)))
        }
    }

    #[async_trait]
    impl ClientFactory for EchoFactory {
        async fn connect(&self, device: &str) -> Result<Box<dyn ProtocolClient>, ClientFault> {
            if device == "down" {
                return Err(ClientFault::Timeout);
            }
            Ok(Box::new(EchoClient))
        }
    }

    fn targets(devices: &[&str]) -> DeviceTargets {
        devices
            .iter()
            .map(|d| {
                let run = PollTarget {
                    address: 100,
                    length: 2,
                    unit: 0,
                    scale: 1.0,
                    kind: "analog_values".to_string(),
                };
                (d.to_string(), vec![run])
            })
            .collect()
    }

    fn collection(workers: usize) -> CollectionRun {
        CollectionRun::new(
            AgentIdentity::new("fieldpoll-test", "gw01"),
            60,
            DevicePoller::new(Protocol::Bacnet),
        )
        .with_workers(workers)
    }

    #[tokio::test]
    async fn test_envelope_fields() {
        let factory: Arc<dyn ClientFactory> = Arc::new(EchoFactory);
        let payload = collection(1).run(&targets(&["10.0.0.1"]), &factory).await;

        assert_eq!(payload.agent_program, "fieldpoll-test");
        assert_eq!(payload.agent_hostname, "gw01");
        assert_eq!(payload.gateway, "gw01");
        assert_eq!(payload.polling_interval, 60);
        assert_eq!(payload.agent_id.len(), 64);
        assert!(payload.timestamp > 0);
        assert_eq!(payload.point_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_isolated() {
        let factory: Arc<dyn ClientFactory> = Arc::new(EchoFactory);
        let payload = collection(1)
            .run(&targets(&["b", "down", "a"]), &factory)
            .await;

        let devices: Vec<&str> = payload
            .device_point_sets
            .iter()
            .map(|s| s.device.as_str())
            .collect();
        assert_eq!(devices, vec!["a", "b", "down"]);
        assert_eq!(payload.device_point_sets[0].len(), 2);
        assert!(payload.device_point_sets[2].is_empty());
    }

    #[tokio::test]
    async fn test_no_devices() {
        let factory: Arc<dyn ClientFactory> = Arc::new(EchoFactory);
        let payload = collection(4).run(&DeviceTargets::new(), &factory).await;
        assert!(payload.device_point_sets.is_empty());
    }

    #[test]
    fn test_workers_floor() {
        assert_eq!(collection(0).workers(), 1);
    }
}
