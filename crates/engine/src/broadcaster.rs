//! Spectator fan-out
//!
//! Broadcaster state is purely instance-local: a set of spectator sinks per
//! contest. The owning instance's broadcasts also go out on a per-contest
//! bus channel; an instance whose spectators watch a contest owned elsewhere
//! runs a relay task that forwards frames from that channel into its local
//! sinks.

use agora_core::{ContestId, SpectatorEvent, SpectatorFrame};
use agora_store::{keys, MessageBus};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receiving end handed to a joined spectator.
pub type SpectatorReceiver = mpsc::UnboundedReceiver<SpectatorFrame>;

/// Per-instance spectator fan-out.
pub struct SpectatorBroadcaster {
    bus: Arc<dyn MessageBus>,
    sinks: DashMap<ContestId, HashMap<u64, mpsc::UnboundedSender<SpectatorFrame>>>,
    relays: DashMap<ContestId, JoinHandle<()>>,
    next_sink: AtomicU64,
}

impl SpectatorBroadcaster {
    /// Create a broadcaster publishing on the given bus.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            sinks: DashMap::new(),
            relays: DashMap::new(),
            next_sink: AtomicU64::new(0),
        }
    }

    /// Add a spectator sink. Returns its id, the frame receiver, and the new
    /// local count.
    pub fn join(&self, contest: ContestId) -> (u64, SpectatorReceiver, usize) {
        let sink_id = self.next_sink.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let count = {
            let mut sinks = self.sinks.entry(contest).or_default();
            sinks.insert(sink_id, tx);
            sinks.len()
        };
        debug!(target: "agora::engine", contest_id = %contest, count, "spectator joined");
        (sink_id, rx, count)
    }

    /// Remove a spectator sink. Returns the new local count.
    pub fn leave(&self, contest: ContestId, sink_id: u64) -> usize {
        let count = match self.sinks.get_mut(&contest) {
            Some(mut sinks) => {
                sinks.remove(&sink_id);
                sinks.len()
            }
            None => 0,
        };
        if count == 0 {
            self.sinks.remove_if(&contest, |_, s| s.is_empty());
            self.stop_relay(contest);
        }
        count
    }

    /// Current local spectator count.
    pub fn local_count(&self, contest: ContestId) -> usize {
        self.sinks.get(&contest).map(|s| s.len()).unwrap_or(0)
    }

    /// Deliver a frame to this instance's sinks only.
    pub fn broadcast_local(&self, frame: &SpectatorFrame) {
        if let Some(mut sinks) = self.sinks.get_mut(&frame.debate_id) {
            // Closed receivers are dropped as encountered.
            sinks.retain(|_, tx| tx.send(frame.clone()).is_ok());
        }
    }

    /// Owner-side broadcast: local fan-out plus the bus relay channel, so
    /// peers with spectators of this contest can forward the frame.
    pub async fn broadcast(&self, contest: ContestId, event: SpectatorEvent) {
        let frame = SpectatorFrame {
            debate_id: contest,
            event,
        };
        self.broadcast_local(&frame);
        match serde_json::to_string(&frame) {
            Ok(payload) => {
                if let Err(e) = self
                    .bus
                    .publish(&keys::spectator_channel(contest), &payload)
                    .await
                {
                    warn!(target: "agora::engine", contest_id = %contest, error = %e, "spectator relay publish failed");
                }
            }
            Err(e) => {
                warn!(target: "agora::engine", contest_id = %contest, error = %e, "frame encoding failed");
            }
        }
    }

    /// Start forwarding a remotely-owned contest's frames into local sinks.
    ///
    /// Idempotent; the relay stops when the last local spectator leaves or
    /// when this instance adopts the contest.
    pub async fn ensure_remote_watch(self: Arc<Self>, contest: ContestId) {
        if self.relays.contains_key(&contest) {
            return;
        }
        let sub = match self.bus.subscribe(&keys::spectator_channel(contest)).await {
            Ok(sub) => sub,
            Err(e) => {
                warn!(target: "agora::engine", contest_id = %contest, error = %e, "remote watch subscribe failed");
                return;
            }
        };
        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut sub = sub;
            while let Some(raw) = sub.recv().await {
                match serde_json::from_str::<SpectatorFrame>(&raw) {
                    Ok(frame) => this.broadcast_local(&frame),
                    Err(e) => {
                        warn!(target: "agora::engine", contest_id = %contest, error = %e, "malformed relay frame dropped");
                    }
                }
                if this.local_count(contest) == 0 {
                    break;
                }
            }
            this.relays.remove(&contest);
        });
        if let Some(previous) = self.relays.insert(contest, handle) {
            previous.abort();
        }
    }

    /// Stop the relay for a contest, keeping local sinks.
    pub fn stop_relay(&self, contest: ContestId) {
        if let Some((_, handle)) = self.relays.remove(&contest) {
            handle.abort();
        }
    }

    /// Drop all state for a contest: sinks and relay.
    pub fn forget(&self, contest: ContestId) {
        self.sinks.remove(&contest);
        self.stop_relay(contest);
    }
}
