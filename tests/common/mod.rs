//! Shared harness for the end-to-end suites
//!
//! Builds a simulated deployment: one shared in-memory KV store, bus, and
//! database, plus any number of platform instances on top of them. Bots are
//! driven by scripted responder tasks over in-process connections; suites
//! run under a paused tokio clock so TTLs, sweeps, and voting windows are
//! deterministic.

#![allow(dead_code)]

use agora::{
    Bot, BotHub, BotId, BotToServer, ChannelConnection, Config, Instance, KvStore, MemoryBus,
    MemoryKv, MemoryStore, MessageBus, Preset, PresetId, PresetRegistry, ServerToBot,
    SpectatorFrame, StakeSettlement, Topic, UserId, WinnerTakesAll,
};
use agora_core::{RoundConfig, Speaker, WordLimit};
use agora_repo::{BotRepository, TopicRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A simulated multi-instance deployment over shared backends.
pub struct Cluster {
    pub kv: Arc<MemoryKv>,
    pub bus: Arc<MemoryBus>,
    pub store: Arc<MemoryStore>,
}

impl Cluster {
    pub fn new() -> Self {
        Self {
            kv: MemoryKv::shared(),
            bus: MemoryBus::shared(),
            store: MemoryStore::shared(),
        }
    }

    /// Build (but do not start) an instance on the shared backends.
    pub fn instance(&self, name: &str) -> Arc<Instance> {
        self.instance_with(name, Arc::new(WinnerTakesAll))
    }

    pub fn instance_with(&self, name: &str, settlement: Arc<dyn StakeSettlement>) -> Arc<Instance> {
        Instance::new(
            Config::for_instance(name),
            Arc::clone(&self.kv) as Arc<dyn KvStore>,
            Arc::clone(&self.bus) as Arc<dyn MessageBus>,
            MemoryStore::repositories(&self.store),
            Arc::new(test_registry()),
            settlement,
        )
        .expect("instance must assemble")
    }

    /// Register a bot under a 64-hex token derived from `token_byte`.
    pub async fn register_bot(&self, name: &str, token_byte: char) -> (Bot, String) {
        let token = token(token_byte);
        let bot = Bot::new(name, UserId::new());
        BotRepository::insert(&*self.store, &bot, &token)
            .await
            .expect("bot insert");
        (bot, token)
    }

    pub async fn register_topic(&self, text: &str) -> Topic {
        let topic = Topic::new(text);
        TopicRepository::insert(&*self.store, &topic)
            .await
            .expect("topic insert");
        topic
    }
}

/// 64-hex connect token from one hex digit.
pub fn token(byte: char) -> String {
    byte.to_string().repeat(64)
}

/// The built-in presets plus a short two-round preset for fast suites.
pub fn test_registry() -> PresetRegistry {
    let builtins = PresetRegistry::with_builtins();
    PresetRegistry::from_presets(vec![
        builtins.get(&PresetId::from("classic")).expect("classic"),
        builtins.get(&PresetId::from("blitz")).expect("blitz"),
        lightning(),
    ])
}

/// Two `both`-speaker rounds, 3 s turn deadline, 5 s voting windows.
pub fn lightning() -> Preset {
    Preset {
        id: PresetId::from("lightning"),
        name: "Lightning".to_string(),
        rounds: vec![
            RoundConfig {
                name: "opening".to_string(),
                speaker: Speaker::Both,
                time_limit: 3,
                word_limit: WordLimit { min: 5, max: 100 },
                exchanges: 1,
            },
            RoundConfig {
                name: "closing".to_string(),
                speaker: Speaker::Both,
                time_limit: 3,
                word_limit: WordLimit { min: 5, max: 100 },
                exchanges: 1,
            },
        ],
        prep_time: 1,
        vote_window: 5,
    }
}

/// Attach a bot to a hub and answer every request with `line`.
///
/// Pongs heartbeats so the attachment TTL stays fresh.
pub async fn attach_scripted(
    hub: &Arc<BotHub>,
    token: &str,
    bot_id: BotId,
    line: &'static str,
) -> Arc<ChannelConnection> {
    let (conn, rx) = ChannelConnection::pair();
    hub.attach(token, Arc::clone(&conn) as _)
        .await
        .expect("attach");
    drive_bot(Arc::clone(hub), bot_id, rx, line);
    conn
}

/// Answer requests arriving on `rx` through `hub` with `line`.
pub fn drive_bot(
    hub: Arc<BotHub>,
    bot_id: BotId,
    mut rx: mpsc::UnboundedReceiver<ServerToBot>,
    line: &'static str,
) {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            match envelope {
                ServerToBot::DebateRequest(req) => {
                    let reply = serde_json::to_string(&BotToServer::DebateResponse {
                        request_id: req.request_id,
                        message: line.to_string(),
                        confidence: Some(0.8),
                    })
                    .expect("encode reply");
                    hub.handle_inbound(bot_id, &reply).await;
                }
                ServerToBot::Ping => {
                    hub.handle_inbound(bot_id, r#"{"type":"pong"}"#).await;
                }
                _ => {}
            }
        }
    });
}

/// Receive frames until one satisfies the predicate, failing loudly if the
/// deployment goes quiet first.
pub async fn wait_for_frame(
    frames: &mut mpsc::UnboundedReceiver<SpectatorFrame>,
    what: &str,
    mut predicate: impl FnMut(&SpectatorFrame) -> bool,
) -> SpectatorFrame {
    let deadline = Duration::from_secs(600);
    loop {
        let frame = tokio::time::timeout(deadline, frames.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .unwrap_or_else(|| panic!("frame stream closed waiting for {what}"));
        if predicate(&frame) {
            return frame;
        }
    }
}

/// Poll until the shared database shows an active contest, returning it.
pub async fn wait_for_active_contest(cluster: &Cluster) -> agora::Contest {
    for _ in 0..600 {
        let active = agora_repo::ContestRepository::list_active(&*cluster.store)
            .await
            .expect("list active");
        if let Some(contest) = active.into_iter().next() {
            return contest;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("no contest became active");
}
