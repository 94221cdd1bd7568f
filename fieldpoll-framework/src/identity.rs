//! Agent identity carried in every payload envelope.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hostname setting that means "ask the operating system".
pub const AUTO_HOSTNAME: &str = "auto";

/// Who collected a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Stable identifier derived from program and hostname.
    pub agent_id: String,
    pub agent_program: String,
    pub agent_hostname: String,
}

impl AgentIdentity {
    /// Build the identity for `agent_program` running on `agent_hostname`.
    pub fn new(agent_program: impl Into<String>, agent_hostname: impl Into<String>) -> Self {
        let agent_program = agent_program.into();
        let agent_hostname = agent_hostname.into();

        Self {
            agent_id: agent_id(&agent_program, &agent_hostname),
            agent_program,
            agent_hostname,
        }
    }
}

/// Hex SHA-256 of the program and hostname; the same agent on the same host
/// always gets the same id.
///
/// Each field is hashed after its length as a big-endian u64, so no choice
/// of program and hostname can produce the input of another pair.
pub fn agent_id(agent_program: &str, agent_hostname: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [agent_program, agent_hostname] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Resolve a hostname setting, looking up the system hostname for "auto".
pub fn resolve_hostname(setting: &str) -> String {
    if setting == AUTO_HOSTNAME {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string())
    } else {
        setting.to_string()
    }
}
