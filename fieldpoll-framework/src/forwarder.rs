//! Payload delivery to the central collector.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use zenoh::pubsub::Publisher;

use fieldpoll_common::{CollectionPayload, Format, KeyExprBuilder, encode};

use crate::error::{AgentError, Result};

/// Delivers assembled payloads.
///
/// `post` reports whether the payload reached the collector; `purge` is only
/// called by the scheduling loop after a successful `post`.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Deliver one payload.
    async fn post(&self, payload: &CollectionPayload) -> bool;

    /// Flush anything held back from earlier failed deliveries.
    async fn purge(&self);
}

/// Bounded FIFO of encoded payloads awaiting delivery.
#[derive(Debug, Default)]
pub struct Backlog {
    entries: VecDeque<Vec<u8>>,
    limit: usize,
}

impl Backlog {
    /// Create a backlog holding at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    /// Queue an entry, returning how many old entries were dropped for it.
    pub fn push(&mut self, entry: Vec<u8>) -> usize {
        if self.limit == 0 {
            return 1;
        }

        let mut dropped = 0;
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
            dropped += 1;
        }
        self.entries.push_back(entry);
        dropped
    }

    pub fn front(&self) -> Option<&Vec<u8>> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<Vec<u8>> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Forwards payloads over Zenoh with an in-memory store-and-forward backlog.
///
/// Payloads go to `<prefix>/<program>/<hostname>/payload`. A payload counts
/// as delivered only while at least one subscriber matches that key.
#[derive(Debug)]
pub struct ZenohForwarder {
    publisher: Publisher<'static>,
    key: String,
    format: Format,
    backlog: Mutex<Backlog>,
}

impl ZenohForwarder {
    /// Declare the payload publisher for one agent.
    pub async fn new(
        session: &zenoh::Session,
        keys: &KeyExprBuilder,
        agent_hostname: &str,
        format: Format,
        cache_limit: usize,
    ) -> Result<Self> {
        let key = keys.payload_key(agent_hostname);
        let publisher = session
            .declare_publisher(key.clone())
            .await
            .map_err(|e| AgentError::Forward {
                key: key.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            publisher,
            key,
            format,
            backlog: Mutex::new(Backlog::new(cache_limit)),
        })
    }

    /// Key expression payloads are put on.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of payloads waiting for redelivery.
    pub async fn pending(&self) -> usize {
        self.backlog.lock().await.len()
    }

    fn forward_error(&self, message: impl Into<String>) -> AgentError {
        AgentError::Forward {
            key: self.key.clone(),
            message: message.into(),
        }
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<()> {
        let status = self
            .publisher
            .matching_status()
            .await
            .map_err(|e| self.forward_error(e.to_string()))?;

        if !status.matching() {
            return Err(self.forward_error("no subscriber matches the payload key"));
        }

        self.publisher
            .put(bytes)
            .await
            .map_err(|e| self.forward_error(e.to_string()))
    }
}

#[async_trait]
impl Forwarder for ZenohForwarder {
    async fn post(&self, payload: &CollectionPayload) -> bool {
        let bytes = match encode(payload, self.format) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode payload, dropping it");
                return false;
            }
        };

        match self.put(bytes.clone()).await {
            Ok(()) => {
                tracing::debug!(
                    key = %self.key,
                    bytes = bytes.len(),
                    points = payload.point_count(),
                    "Payload forwarded"
                );
                true
            }
            Err(e) => {
                let mut backlog = self.backlog.lock().await;
                let dropped = backlog.push(bytes);
                tracing::warn!(
                    error = %e,
                    pending = backlog.len(),
                    dropped,
                    "Failed to forward payload, caching it"
                );
                false
            }
        }
    }

    async fn purge(&self) {
        let mut backlog = self.backlog.lock().await;
        let mut sent = 0usize;

        while let Some(entry) = backlog.front() {
            if let Err(e) = self.put(entry.clone()).await {
                tracing::warn!(error = %e, pending = backlog.len(), "Purge stopped");
                break;
            }
            backlog.pop_front();
            sent += 1;
        }

        if sent > 0 {
            tracing::info!(sent, pending = backlog.len(), "Purged cached payloads");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backlog_drops_oldest() {
        let mut backlog = Backlog::new(2);
        assert_eq!(backlog.push(vec![1]), 0);
        assert_eq!(backlog.push(vec![2]), 0);
        assert_eq!(backlog.push(vec![3]), 1);

        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog.pop_front(), Some(vec![2]));
        assert_eq!(backlog.pop_front(), Some(vec![3]));
        assert!(backlog.is_empty());
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut backlog = Backlog::new(0);
        assert_eq!(backlog.push(vec![1]), 1);
        assert!(backlog.is_empty());
        assert_eq!(backlog.limit(), 0);
    }
}
