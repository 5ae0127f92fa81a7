//! Core `adapters` crate for abstracting process-event sources.
//!
//! This crate defines the `EventSource` trait, which outlines how the dashboard
//! opens a subscription to one named channel, and provides the concrete
//! implementations (Socket.IO over WebSocket, in-memory broadcast).

pub mod errors;
pub mod memory;
pub mod models;
pub mod socketio;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

pub use errors::AdapterError;
pub use memory::MemorySource;
pub use models::{Channel, ProcessEvent};
pub use socketio::SocketIoSource;

/// Buffered events per subscription before the reader waits on the consumer.
pub const SUBSCRIPTION_BUFFER: usize = 256;

/// A source of process events, split into named channels.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens a subscription delivering every validated event published on `channel`.
    async fn subscribe(&self, channel: Channel) -> Result<Subscription, AdapterError>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Item handed from an adapter's reader task to its subscription.
pub(crate) type Delivery = Result<ProcessEvent, AdapterError>;

/// A live subscription to exactly one channel.
///
/// The subscription owns the adapter's reader task through a shutdown signal.
/// Releasing it (explicitly or by dropping it) stops the reader, and any
/// event still buffered at that point is discarded.
pub struct Subscription {
    channel: Channel,
    events: mpsc::Receiver<Delivery>,
    shutdown: Option<oneshot::Sender<()>>,
    released: bool,
}

impl Subscription {
    /// Builds the consumer half for an adapter. The reader task must stop when
    /// the paired `oneshot::Receiver` resolves, whether by signal or by drop.
    pub(crate) fn new(
        channel: Channel,
        events: mpsc::Receiver<Delivery>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            channel,
            events,
            shutdown: Some(shutdown),
            released: false,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the subscription is released or the source
    /// finished cleanly, and `Err` when the transport failed. Both are terminal.
    pub async fn recv(&mut self) -> Result<Option<ProcessEvent>, AdapterError> {
        if self.released {
            return Ok(None);
        }
        match self.events.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    /// Stops the reader and drops anything still in flight. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(shutdown) = self.shutdown.take() {
            // The reader may already be gone; nothing to signal then.
            let _ = shutdown.send(());
        }
        self.events.close();
        while self.events.try_recv().is_ok() {}
        log::debug!("released subscription to {}", self.channel);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("released", &self.released)
            .finish()
    }
}
