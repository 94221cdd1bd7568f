/// Default key expression prefix for all fieldpoll payloads.
pub const KEY_PREFIX: &str = "fieldpoll";

/// Builder for the key expressions an agent forwards payloads on.
///
/// Key expressions follow the pattern:
/// `<prefix>/<agent_program>/<agent_hostname>/payload`
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
    agent_program: String,
}

impl KeyExprBuilder {
    /// Create a builder for an agent program under the default prefix.
    pub fn new(agent_program: impl Into<String>) -> Self {
        Self::with_prefix(KEY_PREFIX, agent_program)
    }

    /// Create a builder with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>, agent_program: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            agent_program: agent_program.into(),
        }
    }

    /// Build the payload key for an agent host.
    ///
    /// # Example
    /// ```
    /// use fieldpoll_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("fieldpoll-agent-modbus");
    /// let key = builder.payload_key("gw01");
    /// assert_eq!(key, "fieldpoll/fieldpoll-agent-modbus/gw01/payload");
    /// ```
    pub fn payload_key(&self, agent_hostname: &str) -> String {
        format!(
            "{}/{}/{}/payload",
            self.prefix,
            self.agent_program,
            sanitize_chunk(agent_hostname)
        )
    }
}

/// Replace characters Zenoh reserves in key expression chunks.
fn sanitize_chunk(chunk: &str) -> String {
    chunk
        .chars()
        .map(|c| match c {
            '/' | '*' | '$' | '?' | '#' => '_',
            other => other,
        })
        .collect()
}
