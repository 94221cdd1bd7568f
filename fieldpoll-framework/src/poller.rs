//! Per-device polling with fault isolation.

use fieldpoll_common::{CanonicalPoint, DevicePointSet, PointValue, Protocol};

use crate::client::{ClientFault, ProtocolClient, RawValue};
use crate::resolver::PollTarget;

/// Tag carrying the point kind (address-list key).
pub const TAG_KIND: &str = "kind";

/// Tag carrying the protocol unit, only set when non-zero.
pub const TAG_UNIT: &str = "unit";

/// A point that was skipped because its read failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPoint {
    pub address: u32,
    pub kind: String,
    pub fault: ClientFault,
}

/// Result of polling one device, including what was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePoll {
    pub points: DevicePointSet,
    pub skipped: Vec<SkippedPoint>,
}

/// Polls the targets of one device and turns raw values into canonical points.
#[derive(Debug, Clone, Copy)]
pub struct DevicePoller {
    protocol: Protocol,
}

impl DevicePoller {
    /// Create a poller producing metrics for `protocol`.
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Poll every target of `device` and return its points.
    ///
    /// Failed reads are logged and skipped; this never fails as a whole.
    pub async fn poll(
        &self,
        device: &str,
        targets: &[PollTarget],
        client: &mut dyn ProtocolClient,
    ) -> DevicePointSet {
        self.poll_detailed(device, targets, client).await.points
    }

    /// Like [`poll`](Self::poll), also returning the skipped points.
    pub async fn poll_detailed(
        &self,
        device: &str,
        targets: &[PollTarget],
        client: &mut dyn ProtocolClient,
    ) -> DevicePoll {
        let mut points = DevicePointSet::new(device);
        let mut skipped = Vec::new();

        for target in targets {
            for (address, outcome) in client.read_run(target).await {
                match outcome {
                    Ok(raw) => points.points.push(self.point(device, target, address, raw)),
                    Err(fault) => {
                        log_fault(device, target, address, &fault);
                        skipped.push(SkippedPoint {
                            address,
                            kind: target.kind.clone(),
                            fault,
                        });
                    }
                }
            }
        }

        tracing::debug!(
            device = %device,
            points = points.len(),
            skipped = skipped.len(),
            "Device polled"
        );

        DevicePoll { points, skipped }
    }

    fn point(&self, device: &str, target: &PollTarget, address: u32, raw: RawValue) -> CanonicalPoint {
        let value = transform(raw, target.scale);
        let mut point = CanonicalPoint::new(
            metric_name(self.protocol, &target.kind),
            value,
            device,
            address,
        )
        .with_tag(TAG_KIND, target.kind.clone());

        if target.unit != 0 {
            point = point.with_tag(TAG_UNIT, target.unit.to_string());
        }

        point
    }
}

/// Scale numeric values; pass anything else through as text.
pub fn transform(raw: RawValue, scale: f64) -> PointValue {
    match raw {
        RawValue::Number(n) => PointValue::Numeric(n * scale),
        RawValue::Text(text) => match RawValue::parse_number(&text) {
            Some(n) => PointValue::Numeric(n * scale),
            None => PointValue::Text(text),
        },
    }
}

/// Metric name for a protocol and point kind, e.g. `modbus_input_registers`.
pub fn metric_name(protocol: Protocol, kind: &str) -> String {
    format!("{}_{}", protocol.as_str(), kind)
}

fn log_fault(device: &str, target: &PollTarget, address: u32, fault: &ClientFault) {
    match fault {
        ClientFault::Timeout => tracing::info!(
            device = %device,
            kind = %target.kind,
            address,
            "No response from device, skipping point (timeout)"
        ),
        ClientFault::UnknownTarget(detail) => tracing::info!(
            device = %device,
            kind = %target.kind,
            address,
            detail = %detail,
            "Unknown object requested from device, skipping point"
        ),
        ClientFault::Protocol(reason) => tracing::warn!(
            device = %device,
            kind = %target.kind,
            address,
            error = %reason,
            "Error polling device, skipping point"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fieldpoll_common::ValueKind;
    use std::collections::HashMap;

    /// Answers from a fixed table; unknown addresses are `UnknownTarget`.
    struct TableClient {
        values: HashMap<u32, Result<RawValue, ClientFault>>,
        reads: Vec<u32>,
    }

    impl TableClient {
        fn new(values: Vec<(u32, Result<RawValue, ClientFault>)>) -> Self {
            Self {
                values: values.into_iter().collect(),
                reads: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ProtocolClient for TableClient {
        async fn read(&mut self, _target: &PollTarget, address: u32) -> Result<RawValue, ClientFault> {
            self.reads.push(address);
            self.values
                .get(&address)
                .cloned()
                .unwrap_or_else(|| Err(ClientFault::UnknownTarget(address.to_string())))
        }
    }

    fn run(address: u32, length: u32, scale: f64) -> PollTarget {
        PollTarget {
            address,
            length,
            unit: 2,
            scale,
            kind: "input_registers".to_string(),
        }
    }

    #[tokio::test]
    async fn test_timeout_isolated_to_one_point() {
        let mut client = TableClient::new(vec![
            (1, Ok(RawValue::Number(10.0))),
            (2, Ok(RawValue::Number(11.0))),
            (3, Err(ClientFault::Timeout)),
            (10, Ok(RawValue::from("OK"))),
        ]);
        let targets = vec![run(1, 3, 1.0), run(10, 1, 1.0)];

        let poller = DevicePoller::new(Protocol::Modbus);
        let result = poller.poll_detailed("10.0.0.1", &targets, &mut client).await;

        assert_eq!(client.reads, vec![1, 2, 3, 10]);
        assert_eq!(result.points.device, "10.0.0.1");
        assert_eq!(result.points.len(), 3);
        assert_eq!(
            result.skipped,
            vec![SkippedPoint {
                address: 3,
                kind: "input_registers".to_string(),
                fault: ClientFault::Timeout,
            }]
        );

        let kinds: Vec<ValueKind> = result.points.points.iter().map(|p| p.value_kind).collect();
        assert_eq!(
            kinds,
            vec![ValueKind::Numeric, ValueKind::Numeric, ValueKind::String]
        );
    }

    #[tokio::test]
    async fn test_every_fault_kind_is_skipped() {
        let mut client = TableClient::new(vec![
            (1, Err(ClientFault::Protocol("connection reset".to_string()))),
            (2, Ok(RawValue::Number(5.0))),
            (4, Err(ClientFault::Timeout)),
        ]);
        let targets = vec![run(1, 4, 1.0)];

        let poller = DevicePoller::new(Protocol::Bacnet);
        let result = poller.poll_detailed("plc", &targets, &mut client).await;

        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points.points[0].point(), Some("2"));
        let labels: Vec<&str> = result.skipped.iter().map(|s| s.fault.label()).collect();
        assert_eq!(labels, vec!["protocol", "unknown_target", "timeout"]);
    }

    #[tokio::test]
    async fn test_points_are_scaled_and_tagged() {
        let mut client = TableClient::new(vec![
            (7, Ok(RawValue::Number(215.0))),
            (8, Ok(RawValue::from("12.5"))),
        ]);
        let targets = vec![run(7, 2, 0.1)];

        let points = DevicePoller::new(Protocol::Modbus)
            .poll("10.0.0.1", &targets, &mut client)
            .await;

        let first = &points.points[0];
        assert_eq!(first.metric, "modbus_input_registers");
        assert!((first.value.as_f64().unwrap() - 21.5).abs() < 1e-9);
        assert_eq!(first.device(), Some("10.0.0.1"));
        assert_eq!(first.point(), Some("7"));
        assert_eq!(first.tags.get(TAG_KIND), Some(&"input_registers".to_string()));
        assert_eq!(first.tags.get(TAG_UNIT), Some(&"2".to_string()));

        let second = &points.points[1];
        assert_eq!(second.value_kind, ValueKind::Numeric);
        assert!((second.value.as_f64().unwrap() - 1.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_targets_gives_empty_set() {
        let mut client = TableClient::new(Vec::new());
        let points = DevicePoller::new(Protocol::Snmp)
            .poll("switch01", &[], &mut client)
            .await;

        assert_eq!(points.device, "switch01");
        assert!(points.is_empty());
    }

    #[test]
    fn test_transform() {
        assert_eq!(transform(RawValue::Number(4.0), 2.5), PointValue::Numeric(10.0));
        assert_eq!(
            transform(RawValue::from("active"), 2.5),
            PointValue::Text("active".to_string())
        );
        assert_eq!(transform(RawValue::from("3"), 2.0), PointValue::Numeric(6.0));
    }

    #[test]
    fn test_metric_name() {
        assert_eq!(metric_name(Protocol::Bacnet, "analog_values"), "bacnet_analog_values");
    }
}
