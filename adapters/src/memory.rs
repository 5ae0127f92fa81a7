//! In-process event source backed by a broadcast channel.
//!
//! Payloads are published untyped, the same way they would arrive from a
//! socket, so the validation boundary is exercised exactly as in production.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::errors::AdapterError;
use crate::models::{Channel, ProcessEvent};
use crate::{EventSource, Subscription, SUBSCRIPTION_BUFFER};

const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Published {
    channel: Channel,
    payload: Value,
}

#[derive(Clone)]
pub struct MemorySource {
    tx: broadcast::Sender<Published>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publishes a raw payload. Returns how many subscriptions will see it.
    pub fn publish(&self, channel: Channel, payload: Value) -> usize {
        self.tx
            .send(Published { channel, payload })
            .unwrap_or_default()
    }

    /// Convenience: publish a typed event.
    pub fn emit(&self, channel: Channel, event: &ProcessEvent) -> usize {
        match serde_json::to_value(event) {
            Ok(payload) => self.publish(channel, payload),
            Err(err) => {
                log::warn!("could not encode event for {}: {}", channel, err);
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn subscribe(&self, channel: Channel) -> Result<Subscription, AdapterError> {
        let rx = self.tx.subscribe();
        let (events_tx, events_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(forward(channel, rx, events_tx, shutdown_rx));

        Ok(Subscription::new(channel, events_rx, shutdown_tx))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

async fn forward(
    channel: Channel,
    mut rx: broadcast::Receiver<Published>,
    events: mpsc::Sender<Result<ProcessEvent, AdapterError>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = rx.recv() => match result {
                Ok(published) if published.channel == channel => {
                    match ProcessEvent::from_payload(&published.payload) {
                        Ok(event) => {
                            if events.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => log::warn!("dropping event on {}: {}", channel, err),
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("memory source lagged on {}, dropped {} events", channel, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_only_the_subscribed_channel() {
        let source = MemorySource::new();
        let mut started = source.subscribe(Channel::ProcessesStarted).await.unwrap();

        source.emit(Channel::ProcessesEnded, &ProcessEvent::new("b", 2, "d"));
        source.emit(Channel::ProcessesStarted, &ProcessEvent::new("a", 1, "d"));

        assert_eq!(
            started.recv().await.unwrap(),
            Some(ProcessEvent::new("a", 1, "d"))
        );
    }

    #[tokio::test]
    async fn malformed_payloads_are_dropped() {
        let source = MemorySource::new();
        let mut sub = source.subscribe(Channel::ProcessesStarted).await.unwrap();

        source.publish(Channel::ProcessesStarted, json!({"name": "a"}));
        source.publish(Channel::ProcessesStarted, json!("garbage"));
        source.emit(Channel::ProcessesStarted, &ProcessEvent::new("ok", 3, "d"));

        assert_eq!(
            sub.recv().await.unwrap(),
            Some(ProcessEvent::new("ok", 3, "d"))
        );
    }

    #[tokio::test]
    async fn release_discards_buffered_events_and_is_idempotent() {
        let source = MemorySource::new();
        let mut sub = source.subscribe(Channel::ProcessesEnded).await.unwrap();

        source.emit(Channel::ProcessesEnded, &ProcessEvent::new("a", 1, "d"));
        tokio::task::yield_now().await;

        sub.release();
        sub.release();
        assert!(sub.is_released());
        assert_eq!(sub.recv().await.unwrap(), None);

        source.emit(Channel::ProcessesEnded, &ProcessEvent::new("b", 2, "d"));
        assert_eq!(sub.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropping_the_source_ends_the_subscription() {
        let source = MemorySource::new();
        let mut sub = source.subscribe(Channel::ProcessesStarted).await.unwrap();
        drop(source);
        assert_eq!(sub.recv().await.unwrap(), None);
    }
}
