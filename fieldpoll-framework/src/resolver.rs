//! Poll target resolution from the `polling_groups` configuration tree.
//!
//! A polling group looks like:
//!
//! ```json5
//! {
//!     ip_devices: ["10.0.0.1", "plc02.local"],
//!     input_registers: [1, 2, 3, 10],
//!     holding_registers: [100],
//!     unit: 2,
//!     multiplier: 0.1,
//! }
//! ```
//!
//! Only a missing `polling_groups` section is fatal. Malformed groups, lists
//! and values are skipped or defaulted so one bad group never stops the
//! others from being polled.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::compact::compact;

/// Configuration key holding the list of polling groups.
pub const POLLING_GROUPS_KEY: &str = "polling_groups";

/// Group key for the optional unit value.
pub const UNIT_KEY: &str = "unit";

/// Group key for the optional value multiplier.
pub const MULTIPLIER_KEY: &str = "multiplier";

/// Unit used when a group has no usable unit value.
pub const DEFAULT_UNIT: i64 = 0;

/// Scale used when a group has no usable multiplier.
pub const DEFAULT_SCALE: f64 = 1.0;

/// One contiguous run of addresses to query on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollTarget {
    /// First address of the run.
    pub address: u32,
    /// Number of consecutive addresses (always at least 1).
    pub length: u32,
    /// Protocol unit (e.g. Modbus unit id), 0 when unset.
    pub unit: i64,
    /// Multiplier applied to numeric values.
    pub scale: f64,
    /// Address-list key this run came from (e.g. "input_registers").
    pub kind: String,
}

impl PollTarget {
    /// Addresses covered by this run.
    pub fn addresses(&self) -> RangeInclusive<u32> {
        let last = u64::from(self.address) + u64::from(self.length.max(1)) - 1;
        self.address..=u32::try_from(last).unwrap_or(u32::MAX)
    }
}

/// Poll targets per device, iterated in device order.
pub type DeviceTargets = BTreeMap<String, Vec<PollTarget>>;

/// Which keys of a polling group a protocol understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollLayout {
    /// Key of the device list (e.g. "ip_devices").
    pub device_key: String,
    /// Address-list keys, one per supported point kind.
    pub kinds: Vec<String>,
}

impl PollLayout {
    pub fn new<I, S>(device_key: impl Into<String>, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_key: device_key.into(),
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }
}

/// Structural configuration errors. These are fatal for the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("required configuration section 'polling_groups' is missing")]
    MissingPollingGroups,

    #[error("configuration section 'polling_groups' must be a list, found {0}")]
    InvalidPollingGroups(&'static str),
}

/// Builds [`DeviceTargets`] from a configuration tree.
#[derive(Debug, Clone)]
pub struct TargetResolver<'a> {
    tree: &'a Value,
    layout: PollLayout,
}

impl<'a> TargetResolver<'a> {
    /// Create a resolver over a configuration tree.
    pub fn new(tree: &'a Value, layout: PollLayout) -> Self {
        Self { tree, layout }
    }

    /// Resolve every polling group into per-device targets.
    pub fn resolve(&self) -> Result<DeviceTargets, ResolveError> {
        let groups = match self.tree.get(POLLING_GROUPS_KEY) {
            None | Some(Value::Null) => return Err(ResolveError::MissingPollingGroups),
            Some(Value::Array(groups)) => groups,
            Some(other) => return Err(ResolveError::InvalidPollingGroups(type_name(other))),
        };

        let mut targets = DeviceTargets::new();

        for (index, group) in groups.iter().enumerate() {
            let Value::Object(group) = group else {
                tracing::debug!(group = index, "Skipping polling group that is not a mapping");
                continue;
            };

            let unit = coerce_unit(group.get(UNIT_KEY));
            let scale = coerce_scale(group.get(MULTIPLIER_KEY));

            for kind in &self.layout.kinds {
                let (Some(Value::Array(devices)), Some(Value::Array(addresses))) =
                    (group.get(&self.layout.device_key), group.get(kind))
                else {
                    continue;
                };

                let runs = compact(addresses.iter().filter_map(as_address));
                if runs.is_empty() {
                    continue;
                }

                for device in devices.iter().filter_map(Value::as_str) {
                    let entry = targets.entry(device.to_string()).or_default();
                    entry.extend(runs.iter().map(|&(address, length)| PollTarget {
                        address,
                        length,
                        unit,
                        scale,
                        kind: kind.clone(),
                    }));
                }
            }
        }

        tracing::debug!(
            devices = targets.len(),
            targets = targets.values().map(Vec::len).sum::<usize>(),
            "Resolved poll targets"
        );

        Ok(targets)
    }
}

/// Lenient unit coercion.
///
/// Integers pass through, floats and float-like strings are truncated toward
/// zero (`"12.9"` becomes `12`), everything else becomes [`DEFAULT_UNIT`].
pub fn coerce_unit(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate))
            .unwrap_or(DEFAULT_UNIT),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
                .unwrap_or(DEFAULT_UNIT)
        }
        _ => DEFAULT_UNIT,
    }
}

/// Lenient multiplier coercion. Anything not a finite number becomes [`DEFAULT_SCALE`].
pub fn coerce_scale(value: Option<&Value>) -> f64 {
    let scale = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    scale.filter(|s| s.is_finite()).unwrap_or(DEFAULT_SCALE)
}

fn truncate(f: f64) -> Option<i64> {
    // `as` saturates, so reject values outside the i64 range explicitly.
    if f.is_finite() && f > i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn as_address(value: &Value) -> Option<u32> {
    // Whole floats (`3.0`) are accepted since JSON5 does not distinguish them.
    let n = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
            .map(|f| f as u64)
    })?;
    u32::try_from(n).ok()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
