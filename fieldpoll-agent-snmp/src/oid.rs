use anyhow::{Result, anyhow};
use snmp2::Oid;

/// Parse an OID string (e.g., "1.3.6.1.2.1.2.2.1.10") into an snmp2::Oid.
pub fn parse_oid(oid_str: &str) -> Result<Oid<'static>> {
    oid_str
        .trim_start_matches('.')
        .parse::<Oid>()
        .map_err(|e| anyhow!("Failed to parse OID '{}': {:?}", oid_str, e))
        .map(|oid| oid.to_owned())
}

/// OID of one table cell: the column OID followed by the row index.
pub fn instance_oid(column: &str, index: u32) -> Result<Oid<'static>> {
    parse_oid(&format!("{}.{}", column.trim_end_matches('.'), index))
}

/// Convert an snmp2::Oid back to a dotted string representation.
pub fn oid_to_string(oid: &Oid) -> String {
    oid.to_id_string()
}
