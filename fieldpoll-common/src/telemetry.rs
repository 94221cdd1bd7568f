use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tag carrying the device identifier a point was polled from.
pub const TAG_DEVICE: &str = "device";

/// Tag carrying the address or point identifier.
pub const TAG_POINT: &str = "point";

/// A single normalized data point, independent of the source protocol.
///
/// `value_kind` always agrees with `value`; build points through
/// [`CanonicalPoint::new`] to keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPoint {
    /// Metric name (e.g., "modbus_input_registers").
    pub metric: String,

    /// The measured value.
    pub value: PointValue,

    /// Classification of `value`.
    pub value_kind: ValueKind,

    /// Identifying tags. Always contains `device` and `point`.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl CanonicalPoint {
    /// Create a point for `device`/`point` with the kind derived from the value.
    pub fn new(
        metric: impl Into<String>,
        value: PointValue,
        device: impl Into<String>,
        point: impl ToString,
    ) -> Self {
        let value_kind = value.kind();
        let mut tags = HashMap::new();
        tags.insert(TAG_DEVICE.to_string(), device.into());
        tags.insert(TAG_POINT.to_string(), point.to_string());

        Self {
            metric: metric.into(),
            value,
            value_kind,
            tags,
        }
    }

    /// Add a tag to this point.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// The `device` tag.
    pub fn device(&self) -> Option<&str> {
        self.tags.get(TAG_DEVICE).map(String::as_str)
    }

    /// The `point` tag.
    pub fn point(&self) -> Option<&str> {
        self.tags.get(TAG_POINT).map(String::as_str)
    }
}

/// Value of a canonical point after transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    /// Scaled numeric value.
    Numeric(f64),

    /// Pass-through text value.
    Text(String),
}

impl PointValue {
    /// Get the value kind.
    pub fn kind(&self) -> ValueKind {
        match self {
            PointValue::Numeric(_) => ValueKind::Numeric,
            PointValue::Text(_) => ValueKind::String,
        }
    }

    /// Get the numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Numeric(v) => Some(*v),
            PointValue::Text(_) => None,
        }
    }
}

impl From<f64> for PointValue {
    fn from(v: f64) -> Self {
        PointValue::Numeric(v)
    }
}

impl From<String> for PointValue {
    fn from(v: String) -> Self {
        PointValue::Text(v)
    }
}

impl From<&str> for PointValue {
    fn from(v: &str) -> Self {
        PointValue::Text(v.to_string())
    }
}

/// Value classification of a canonical point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueKind {
    Numeric,
    String,
}

/// All points polled from one device during a collection run.
///
/// A device that yielded nothing still gets a set, with no points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePointSet {
    /// Device identifier (IP address or host name).
    pub device: String,

    /// Points in polling order.
    #[serde(default)]
    pub points: Vec<CanonicalPoint>,
}

impl DevicePointSet {
    /// Create an empty point set for a device.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Everything one agent collected during one polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPayload {
    pub agent_id: String,
    pub agent_program: String,
    pub agent_hostname: String,

    /// Polling interval in seconds.
    pub polling_interval: u64,

    /// Host the devices were polled through.
    pub gateway: String,

    /// Unix epoch milliseconds when the cycle started.
    pub timestamp: i64,

    pub device_point_sets: Vec<DevicePointSet>,
}

impl CollectionPayload {
    /// Total number of points across all devices.
    pub fn point_count(&self) -> usize {
        self.device_point_sets.iter().map(DevicePointSet::len).sum()
    }
}

/// Protocol identifier for polled devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Bacnet,
    Modbus,
    Snmp,
}

impl Protocol {
    /// Get the string representation used in metric names and key expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Bacnet => "bacnet",
            Protocol::Modbus => "modbus",
            Protocol::Snmp => "snmp",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
