//! Repository traits
//!
//! Each trait covers one authoritative table. Implementations must make
//! every method atomic per row; the orchestrator's single-writer discipline
//! (one task per contest) supplies all further ordering.

use agora_core::{
    Bot, BotId, Contest, ContestId, ContestStatus, Result, RoundResult, RoundStatus, Side,
    StoredMessage, Topic, TopicId, UserId, Vote,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The contests table.
#[async_trait]
pub trait ContestRepository: Send + Sync {
    /// Insert a freshly created contest row.
    async fn insert(&self, contest: &Contest) -> Result<()>;

    /// Read a contest row.
    async fn fetch(&self, id: ContestId) -> Result<Option<Contest>>;

    /// Move pending → in_progress and stamp `started_at`.
    async fn mark_started(&self, id: ContestId, at: DateTime<Utc>) -> Result<()>;

    /// Update the lifecycle status.
    ///
    /// Rejects transitions out of a terminal status with
    /// [`agora_core::Error::InvalidState`].
    async fn set_status(&self, id: ContestId, status: ContestStatus) -> Result<()>;

    /// Persist the index of the round now running.
    async fn set_current_round(&self, id: ContestId, round: u32) -> Result<()>;

    /// Persist the phase of the current round.
    async fn set_round_status(&self, id: ContestId, status: RoundStatus) -> Result<()>;

    /// Terminal success: status completed, winner set, `completed_at` stamped.
    async fn complete(&self, id: ContestId, winner: Side, at: DateTime<Utc>) -> Result<()>;

    /// Bump the owner liveness signal.
    async fn touch_heartbeat(&self, id: ContestId, at: DateTime<Utc>) -> Result<()>;

    /// Persist the aggregate spectator count.
    async fn set_spectator_count(&self, id: ContestId, count: u32) -> Result<()>;

    /// All contests with status `in_progress` or `voting`.
    async fn list_active(&self) -> Result<Vec<Contest>>;
}

/// The debate messages table. Append-only.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Append one turn.
    async fn append(&self, message: &StoredMessage) -> Result<()>;

    /// All messages of a contest, ordered by `created_at`.
    async fn list(&self, contest: ContestId) -> Result<Vec<StoredMessage>>;
}

/// The votes table. Unique on (contest, round, voter).
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Record a vote. Returns false (and writes nothing) when the voter has
    /// already voted in this (contest, round).
    async fn record(&self, vote: &Vote) -> Result<bool>;

    /// Current (pro, con) tally for a round.
    async fn tally(&self, contest: ContestId, round: u32) -> Result<(u32, u32)>;
}

/// The round results table. Unique on (contest, round); written at round
/// close.
#[async_trait]
pub trait RoundResultRepository: Send + Sync {
    /// Record a result. Returns false (keeping the first record) when one
    /// already exists for this (contest, round).
    async fn record(&self, result: &RoundResult) -> Result<bool>;

    /// Read one round's result.
    async fn fetch(&self, contest: ContestId, round: u32) -> Result<Option<RoundResult>>;

    /// All results of a contest, ordered by round index.
    async fn list(&self, contest: ContestId) -> Result<Vec<RoundResult>>;
}

/// The bots table, plus connect-token resolution.
#[async_trait]
pub trait BotRepository: Send + Sync {
    /// Register a bot under a 64-hex connect token.
    async fn insert(&self, bot: &Bot, token: &str) -> Result<()>;

    /// Read a bot row.
    async fn fetch(&self, id: BotId) -> Result<Option<Bot>>;

    /// Resolve a connect token to its bot.
    async fn resolve_token(&self, token: &str) -> Result<Option<Bot>>;

    /// Apply one match outcome: increment wins or losses and set the new
    /// rating.
    async fn apply_match_result(&self, id: BotId, won: bool, new_rating: i32) -> Result<()>;
}

/// The topics table.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Insert a topic.
    async fn insert(&self, topic: &Topic) -> Result<()>;

    /// Read a topic row.
    async fn fetch(&self, id: TopicId) -> Result<Option<Topic>>;

    /// Pick a topic at random for a new pairing. `None` when the table is
    /// empty.
    async fn pick(&self) -> Result<Option<Topic>>;
}

/// Bundle of all repositories, cloned freely across subsystems.
#[derive(Clone)]
pub struct Repositories {
    /// Contests table.
    pub contests: Arc<dyn ContestRepository>,
    /// Messages table.
    pub messages: Arc<dyn MessageRepository>,
    /// Votes table.
    pub votes: Arc<dyn VoteRepository>,
    /// Round results table.
    pub round_results: Arc<dyn RoundResultRepository>,
    /// Bots table.
    pub bots: Arc<dyn BotRepository>,
    /// Topics table.
    pub topics: Arc<dyn TopicRepository>,
}

/// Voter identity. Voters are platform users.
pub type VoterId = UserId;
