//! Persisted records surrounding a contest
//!
//! Messages, votes, round results, bots, and topics. These mirror the
//! authoritative tables written by the repositories; uniqueness constraints
//! on votes (contest, round, voter) and round results (contest, round) are
//! enforced at the persistence layer.

use crate::contest::Side;
use crate::ids::{BotId, ContestId, TopicId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single turn spoken by a bot.
///
/// Messages for a contest are totally ordered by `created_at`; within a round
/// where both sides speak, all pro messages precede all con messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Contest the message belongs to.
    pub contest_id: ContestId,
    /// Round the message was produced in (0-based).
    pub round_index: u32,
    /// Which side spoke.
    pub position: Side,
    /// The bot that produced the content.
    pub bot_id: BotId,
    /// Turn content. May be fallback text if the bot failed to respond.
    pub content: String,
    /// Persisted order key.
    pub created_at: DateTime<Utc>,
}

/// A spectator's vote for one round.
///
/// At most one vote exists per (contest, round, voter); the first submission
/// wins and later attempts are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Contest voted on.
    pub contest_id: ContestId,
    /// Round voted on.
    pub round_index: u32,
    /// Voter identity.
    pub voter_id: UserId,
    /// Chosen side.
    pub choice: Side,
}

/// The closed tally of one round. Written once, at round close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Contest the round belongs to.
    pub contest_id: ContestId,
    /// Round index (0-based). Unique together with `contest_id`.
    pub round_index: u32,
    /// Votes for the pro side.
    pub pro_votes: u32,
    /// Votes for the con side.
    pub con_votes: u32,
    /// Round winner under the tie policy.
    pub winner: Side,
}

impl RoundResult {
    /// Decide a round winner from a tally.
    ///
    /// Ties go to `pro`: the side that spoke first carries an even round.
    pub fn decide_winner(pro_votes: u32, con_votes: u32) -> Side {
        if pro_votes >= con_votes {
            Side::Pro
        } else {
            Side::Con
        }
    }
}

/// A registered bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    /// Stable identifier.
    pub id: BotId,
    /// Display name, shown to spectators.
    pub name: String,
    /// Owning user.
    pub owner: UserId,
    /// Current rating.
    pub rating: i32,
    /// Completed contests won.
    pub wins: u32,
    /// Completed contests lost.
    pub losses: u32,
}

impl Bot {
    /// Rating assigned to newly registered bots.
    pub const STARTING_RATING: i32 = 1200;

    /// Register a bot with the starting rating and a clean record.
    pub fn new(name: impl Into<String>, owner: UserId) -> Self {
        Self {
            id: BotId::new(),
            name: name.into(),
            owner,
            rating: Self::STARTING_RATING,
            wins: 0,
            losses: 0,
        }
    }
}

/// A debate topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Stable identifier.
    pub id: TopicId,
    /// The proposition under debate.
    pub text: String,
}

impl Topic {
    /// Create a topic.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: TopicId::new(),
            text: text.into(),
        }
    }
}

/// One payout produced by stake settlement at contest completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Receiving user.
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Amount in stake units.
    pub amount: i64,
}
