use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire format for collection payloads handed to the forwarder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON (human-readable, what the central server expects by default).
    #[default]
    Json,

    /// CBOR (compact binary, for constrained uplinks).
    Cbor,
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(|e| Error::encode(format, e)),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf).map_err(|e| Error::encode(format, e))?;
            Ok(buf)
        }
    }
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(|e| Error::decode(format, e)),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::decode(format, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{CanonicalPoint, CollectionPayload, DevicePointSet, PointValue};

    fn sample_payload() -> CollectionPayload {
        let mut set = DevicePointSet::new("10.0.0.1");
        set.points.push(CanonicalPoint::new(
            "modbus_input_registers",
            PointValue::Numeric(21.5),
            "10.0.0.1",
            1,
        ));
        set.points.push(CanonicalPoint::new(
            "modbus_input_registers",
            PointValue::Text("OK".to_string()),
            "10.0.0.1",
            10,
        ));

        CollectionPayload {
            agent_id: "abc".to_string(),
            agent_program: "fieldpoll-agent-modbus".to_string(),
            agent_hostname: "gw01".to_string(),
            polling_interval: 300,
            gateway: "gw01".to_string(),
            timestamp: 1_700_000_000_000,
            device_point_sets: vec![set],
        }
    }

    #[test]
    fn test_json_payload_shape() {
        let encoded = encode(&sample_payload(), Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        let point = &value["device_point_sets"][0]["points"][0];
        assert_eq!(point["value"], 21.5);
        assert_eq!(point["value_kind"], "NUMERIC");
        assert_eq!(point["tags"]["device"], "10.0.0.1");
        assert_eq!(point["tags"]["point"], "1");

        let text = &value["device_point_sets"][0]["points"][1];
        assert_eq!(text["value"], "OK");
        assert_eq!(text["value_kind"], "STRING");
    }

    #[test]
    fn test_cbor_is_smaller() {
        let payload = sample_payload();
        let json = encode(&payload, Format::Json).unwrap();
        let cbor = encode(&payload, Format::Cbor).unwrap();

        assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");
        let decoded: CollectionPayload = decode(&cbor, Format::Cbor).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_error_reports_format() {
        let err = decode::<CollectionPayload>(b"{not json", Format::Json).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                format: Format::Json,
                ..
            }
        ));
    }
}
