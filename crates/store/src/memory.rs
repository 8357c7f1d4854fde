//! In-memory KV and bus backends
//!
//! Process-local implementations of [`KvStore`] and [`MessageBus`]. A
//! single-node deployment uses them directly; the multi-instance test
//! harness shares one of each across several simulated instances, which
//! exercises the same code paths a clustered deployment does.
//!
//! TTLs use `tokio::time::Instant`, so suites running under a paused clock
//! can expire leases deterministically.

use crate::bus::{BusSubscription, MessageBus};
use crate::kv::KvStore;
use agora_core::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory [`KvStore`] with lazy expiry.
///
/// Expired entries are dropped when touched; no background reaper is needed
/// because every coordination path re-reads its keys.
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, KvEntry>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn deadline(ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|t| Instant::now() + t)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Drop the expired entry, re-checking under the entry lock.
        self.entries.remove_if(key, |_, e| e.expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        use dashmap::mapref::entry::Entry;

        let now = Instant::now();
        let fresh = KvEntry {
            value: value.to_string(),
            expires_at: Self::deadline(Some(ttl)),
        };
        // The entry guard holds the shard lock, making check-then-set atomic.
        let won = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expired(now) {
                    occupied.insert(fresh);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        };
        trace!(target: "agora::store", key, won, "set_nx");
        Ok(won)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, e| !e.expired(now) && e.value == expected);
        Ok(removed.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.expired(now) => {
                Ok(entry.expires_at.map(|at| at.duration_since(now)))
            }
            _ => Ok(None),
        }
    }
}

const BUS_CHANNEL_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 256;

/// In-memory [`MessageBus`] over per-channel broadcast queues.
///
/// Delivery is best-effort: a subscriber that falls more than the channel
/// capacity behind loses the overwritten messages, matching the at-least-once
/// /-sometimes-lossy contract of a real bus.
#[derive(Default)]
pub struct MemoryBus {
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bus behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(BUS_CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        // A send error just means nobody is listening.
        let _ = self.sender(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusSubscription> {
        let mut source = self.sender(channel).subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let name = channel.to_string();
        tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            // Subscription dropped.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        trace!(target: "agora::store", channel = %name, missed, "bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(BusSubscription::new(channel, rx))
    }
}
