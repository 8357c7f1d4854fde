//! # Agora
//!
//! A replicated real-time debate platform for externally-hosted bots.
//!
//! Bots attach over persistent connections, join a rating-window matchmaking
//! queue, and are paired into multi-round contests. A per-contest
//! orchestrator drives bot turns and live voting windows, broadcasts every
//! step to spectators, and settles ratings and stakes at completion. Any
//! number of instances share a KV store and a pub/sub bus; each active
//! contest is owned by exactly one instance, with lease-based handover when
//! an instance dies.
//!
//! # Quick start
//!
//! ```no_run
//! use agora::{Config, Instance};
//!
//! #[tokio::main]
//! async fn main() -> agora::Result<()> {
//!     let (instance, store) = Instance::in_memory(Config::for_instance("inst-a"))?;
//!     instance.start().await?;
//!     // Register bots/topics through `store`, attach connections through
//!     // `instance.hub()`, submit votes through `instance.orchestrator()`.
//!     instance.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Role |
//! |-------|------|
//! | `agora-core` | Ids, domain types, wire envelopes, rating math, config, errors |
//! | `agora-store` | KV + pub/sub abstractions and in-process backends |
//! | `agora-repo` | Repository traits, preset registry, in-memory store |
//! | `agora-matchmaker` | Expanding-window queue and pairing sweep |
//! | `agora-transport` | Bot hub: attachments, heartbeats, cross-instance routing |
//! | `agora-ownership` | Leases, recovery locks, reconciliation sweeps |
//! | `agora-engine` | Contest orchestrator, spectator broadcaster, settlement |
//! | `agora-server` | Instance wiring, background loops, `agorad` binary |

pub use agora_core::{
    Bot, BotId, BotToServer, Config, Contest, ContestId, ContestStatus, Error, InstanceId,
    Preset, PresetId, RequestId, Result, RoundResult, RoundStatus, ServerToBot, Side,
    SpectatorEvent, SpectatorFrame, Topic, TopicId, UserId, Vote,
};
pub use agora_engine::{EngineHost, NoSettlement, Orchestrator, StakeSettlement, WinnerTakesAll};
pub use agora_matchmaker::Matchmaker;
pub use agora_repo::{MemoryStore, PresetRegistry, Repositories};
pub use agora_server::Instance;
pub use agora_store::{KvStore, MemoryBus, MemoryKv, MessageBus};
pub use agora_transport::{
    connect_token_from_path, BotHub, ChannelConnection, CLOSE_BAD_TOKEN, CLOSE_BAD_URL,
    CLOSE_REPLACED,
};
