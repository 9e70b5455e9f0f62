//! Per-account event streams fed by the worker pools.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use plaza_db::entities::account;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::api;

/// Events buffered per subscriber before the slowest one starts lagging.
const STREAM_CAPACITY: usize = 256;

/// An event pushed to an account's open streams.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A status entered the home timeline.
    Update(Box<api::Status>),
    /// A status was deleted.
    Delete(String),
    Notification(Box<api::Notification>),
}

/// Hands out receivers for per-account broadcast channels.
#[derive(Clone, Default)]
pub struct StreamingProcessor {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<StreamEvent>>>>,
}

impl StreamingProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events for `account`.
    #[must_use]
    pub fn open_stream(&self, account: &account::Model) -> broadcast::Receiver<StreamEvent> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(account.id.clone())
            .or_insert_with(|| broadcast::channel(STREAM_CAPACITY).0)
            .subscribe()
    }

    /// Whether anyone is listening to `account_id`.
    #[must_use]
    pub fn has_subscribers(&self, account_id: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// Send `event` to `account_id`'s streams. Returns how many received it.
    pub fn publish(&self, account_id: &str, event: StreamEvent) -> usize {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = channels.get(account_id) else {
            return 0;
        };
        if let Ok(received) = tx.send(event) {
            received
        } else {
            // every receiver was dropped
            channels.remove(account_id);
            debug!(account_id, "Closed idle stream");
            0
        }
    }

    /// Send `event` to every open stream.
    pub fn publish_all(&self, event: &StreamEvent) -> usize {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut received = 0;
        channels.retain(|_, tx| match tx.send(event.clone()) {
            Ok(n) => {
                received += n;
                true
            }
            Err(_) => false,
        });
        received
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use plaza_db::test_utils::fixtures;

    #[tokio::test]
    async fn test_publish_reaches_only_the_account() {
        let streams = StreamingProcessor::new();
        let alice = fixtures::local_account("01a", "alice", "plaza.example");
        let bob = fixtures::local_account("01b", "bob", "plaza.example");
        let mut alice_rx = streams.open_stream(&alice);
        let mut bob_rx = streams.open_stream(&bob);

        assert_eq!(streams.publish("01a", StreamEvent::Delete("01s".to_string())), 1);
        assert!(matches!(alice_rx.recv().await.unwrap(), StreamEvent::Delete(id) if id == "01s"));
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receivers_close_the_channel() {
        let streams = StreamingProcessor::new();
        let alice = fixtures::local_account("01a", "alice", "plaza.example");
        let rx = streams.open_stream(&alice);
        assert!(streams.has_subscribers("01a"));

        drop(rx);
        assert!(!streams.has_subscribers("01a"));
        assert_eq!(streams.publish("01a", StreamEvent::Delete("01s".to_string())), 0);
        assert_eq!(streams.publish_all(&StreamEvent::Delete("01s".to_string())), 0);
    }

    #[test]
    fn test_event_json() {
        let json = serde_json::to_value(StreamEvent::Delete("01s".to_string())).unwrap();
        assert_eq!(json["event"], "delete");
        assert_eq!(json["payload"], "01s");
    }
}
