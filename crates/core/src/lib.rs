//! Core types for the Agora debate platform
//!
//! This crate defines the foundational vocabulary shared by every subsystem:
//! - Newtype identifiers (contests, bots, users, topics, presets, instances)
//! - The contest data model and its status machines
//! - Preset (round sequence) descriptions
//! - Wire envelopes for bots, spectators, and the inter-instance bus
//! - Rating arithmetic and the expanding matchmaking window
//! - The unified error type and the instance configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod contest;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod preset;
pub mod rating;
pub mod records;

pub use config::Config;
pub use contest::{Contest, ContestStatus, RoundStatus, Side};
pub use envelope::{
    BotToServer, CharLimit, DebateRequest, InstanceMessage, MatchScore, RatingDeltas,
    ResponseMessage, ServerToBot, SpectatorEvent, SpectatorFrame, TranscriptEntry,
};
pub use error::{Error, Result};
pub use ids::{BotId, ContestId, InstanceId, PresetId, RequestId, TopicId, UserId};
pub use preset::{Preset, RoundConfig, Speaker, WordLimit};
pub use rating::{MatchDeltas, RatingConfig};
pub use records::{Bot, Payout, RoundResult, StoredMessage, Topic, Vote};
