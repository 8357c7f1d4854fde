//! Error types for the Agora platform
//!
//! One unified `Error` enum shared by every subsystem, with category helpers
//! that encode the propagation policy:
//!
//! - **transient** — KV/bus unavailable, bot timeouts and transport failures.
//!   Retried by the next sweep, or surfaced as per-turn fallback content.
//! - **validation** — malformed envelopes, bad replies, unknown presets.
//!   Reported to the caller; a contest turn continues with a placeholder.
//! - **conflict** — duplicate votes, an already-claimed lease. Surfaced as
//!   `false` at the API layer, with no side effects.
//! - **fatal** — unusable configuration or an empty preset registry. Aborts
//!   startup.

use crate::ids::{BotId, ContestId, PresetId, TopicId};
use std::io;
use thiserror::Error;

/// Result type alias for Agora operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the Agora platform.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (sockets, config files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The shared KV store could not be reached or rejected an operation.
    #[error("kv store error: {0}")]
    KvUnavailable(String),

    /// The pub/sub bus could not be reached or rejected an operation.
    #[error("message bus error: {0}")]
    BusUnavailable(String),

    /// The target bot holds no attachment anywhere.
    #[error("Bot not connected")]
    BotNotConnected(BotId),

    /// The bot did not reply before its deadline.
    ///
    /// The display text is embedded verbatim in fallback turn content, so its
    /// wording is part of the external contract.
    #[error("Bot timed out after {0}ms")]
    BotTimeout(u64),

    /// The bot connection failed mid-request.
    #[error("bot transport error: {0}")]
    BotTransport(String),

    /// The bot's reply failed shape validation.
    #[error("invalid bot reply: {0}")]
    InvalidBotReply(String),

    /// An inbound envelope could not be parsed.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The connect token did not resolve to a bot.
    #[error("invalid connect token")]
    InvalidToken,

    /// No preset registered under this id.
    #[error("unknown preset: {0}")]
    UnknownPreset(PresetId),

    /// Contest row missing.
    #[error("contest not found: {0}")]
    ContestNotFound(ContestId),

    /// Bot row missing.
    #[error("bot not found: {0}")]
    BotNotFound(BotId),

    /// Topic row missing.
    #[error("topic not found: {0}")]
    TopicNotFound(TopicId),

    /// A vote already exists for this (contest, round, voter).
    #[error("duplicate vote")]
    DuplicateVote,

    /// The ownership lease is held by another instance.
    #[error("ownership already claimed")]
    AlreadyOwned,

    /// The bot is already committed to a pairing: queued, or playing an
    /// active contest.
    #[error("bot already queued or in an active contest")]
    AlreadyQueued,

    /// An operation was attempted in a state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Unusable configuration.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The preset registry holds no presets; the platform cannot run.
    #[error("preset registry is empty")]
    EmptyPresetRegistry,

    /// The authoritative database cannot be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The instance is shutting down and refuses new work.
    #[error("shutting down")]
    ShuttingDown,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Transient failures clear on their own; the next sweep or the per-turn
    /// fallback handles them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::KvUnavailable(_)
                | Error::BusUnavailable(_)
                | Error::BotNotConnected(_)
                | Error::BotTimeout(_)
                | Error::BotTransport(_)
        )
    }

    /// Conflicts are surfaced as boolean `false` at the API layer.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::DuplicateVote | Error::AlreadyOwned | Error::AlreadyQueued
        )
    }

    /// Fatal errors abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigError(_) | Error::EmptyPresetRegistry | Error::StorageUnavailable(_)
        )
    }
}
