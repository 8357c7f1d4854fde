//! Pub/sub bus abstraction
//!
//! Best-effort, at-least-once delivery. Publishing to a channel nobody
//! subscribes to succeeds and delivers nothing. Subscriptions are dropped to
//! unsubscribe; the cross-instance request path relies on subscribing to the
//! reply channel *before* publishing the request, so `subscribe` must take
//! effect by the time it returns.

use agora_core::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A live subscription to one bus channel.
///
/// Messages arrive in publish order per publisher. Dropping the subscription
/// unsubscribes.
pub struct BusSubscription {
    channel: String,
    rx: mpsc::Receiver<String>,
}

impl BusSubscription {
    /// Build a subscription from a receiving channel.
    ///
    /// Implementations of [`MessageBus`] feed `rx` with raw payloads.
    pub fn new(channel: impl Into<String>, rx: mpsc::Receiver<String>) -> Self {
        Self {
            channel: channel.into(),
            rx,
        }
    }

    /// The channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive the next payload. `None` once the bus drops the channel.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// A best-effort pub/sub bus shared by all instances.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// Subscribe to a channel. Effective once this call returns.
    async fn subscribe(&self, channel: &str) -> Result<BusSubscription>;
}
