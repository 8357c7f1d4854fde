//! Contest data model and status machines
//!
//! A contest is a scheduled multi-round exchange between two bots, `pro` and
//! `con`, arguing a topic under a named preset. The contest row is the
//! authoritative record; the owning instance mirrors it in memory while the
//! contest runs.
//!
//! Status machines:
//!
//! ```text
//! contest: pending → in_progress ⇄ voting → completed
//!              └──────────┴─────────┴→ cancelled
//! round:   pending → bot_responding → voting → completed
//! ```
//!
//! `completed` and `cancelled` are terminal: a contest never leaves them.

use crate::ids::{BotId, ContestId, PresetId, TopicId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Argues in favor of the topic. Speaks first when both sides speak.
    Pro,
    /// Argues against the topic.
    Con,
}

impl Side {
    /// The opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Side::Pro => Side::Con,
            Side::Con => Side::Pro,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Pro => write!(f, "pro"),
            Side::Con => write!(f, "con"),
        }
    }
}

/// Lifecycle status of a contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    /// Created but not yet started.
    Pending,
    /// Actively running rounds on its owning instance.
    InProgress,
    /// A voting window is open. Still active; a crash here is recoverable.
    Voting,
    /// Finished with a winner. Terminal.
    Completed,
    /// Aborted. Terminal.
    Cancelled,
}

impl ContestStatus {
    /// Terminal statuses can never be left.
    pub fn is_terminal(self) -> bool {
        matches!(self, ContestStatus::Completed | ContestStatus::Cancelled)
    }

    /// Whether the contest is live on some instance (or should be).
    ///
    /// Both `in_progress` and `voting` count: the voting window is a phase of
    /// an active contest, and recovery must adopt contests that crashed
    /// mid-window.
    pub fn is_active(self) -> bool {
        matches!(self, ContestStatus::InProgress | ContestStatus::Voting)
    }
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContestStatus::Pending => "pending",
            ContestStatus::InProgress => "in_progress",
            ContestStatus::Voting => "voting",
            ContestStatus::Completed => "completed",
            ContestStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Phase of the current round.
///
/// Cycles pending → bot_responding → voting → completed, skipping no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Round not yet begun.
    Pending,
    /// Bots are producing their turns.
    BotResponding,
    /// The voting window is open; votes for this round are accepted.
    Voting,
    /// Round closed; a result record exists.
    Completed,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoundStatus::Pending => "pending",
            RoundStatus::BotResponding => "bot_responding",
            RoundStatus::Voting => "voting",
            RoundStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// The contest row.
///
/// Persisted by the contest repository; the owning instance keeps a working
/// copy in memory for the duration of the run loop. `heartbeat_at` is bumped
/// by the ownership refresh loop so peers can detect a stuck contest whose
/// owner died without releasing its lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    /// Stable identifier.
    pub id: ContestId,
    /// Bot arguing the pro side.
    pub pro_bot: BotId,
    /// Bot arguing the con side.
    pub con_bot: BotId,
    /// Topic under debate.
    pub topic: TopicId,
    /// Preset dictating the round sequence. Snapshotted at start; immutable.
    pub preset: PresetId,
    /// Lifecycle status.
    pub status: ContestStatus,
    /// Index of the round currently running (0-based).
    pub current_round: u32,
    /// Phase of the current round.
    pub round_status: RoundStatus,
    /// Stake, in integer units, contributed by each side.
    pub stake: i64,
    /// Spectators currently watching, summed across instances best-effort.
    pub spectator_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the contest left `pending`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the contest completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Overall winner. Set iff status is `completed`.
    pub winner: Option<Side>,
    /// Last liveness signal from the owning instance.
    pub heartbeat_at: DateTime<Utc>,
}

impl Contest {
    /// Build a fresh pending contest.
    pub fn new(
        pro_bot: BotId,
        con_bot: BotId,
        topic: TopicId,
        preset: PresetId,
        stake: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ContestId::new(),
            pro_bot,
            con_bot,
            topic,
            preset,
            status: ContestStatus::Pending,
            current_round: 0,
            round_status: RoundStatus::Pending,
            stake,
            spectator_count: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            winner: None,
            heartbeat_at: now,
        }
    }

    /// The bot playing the given side.
    pub fn bot_for(&self, side: Side) -> BotId {
        match side {
            Side::Pro => self.pro_bot,
            Side::Con => self.con_bot,
        }
    }

    /// Which side a bot plays in this contest, if either.
    pub fn side_of(&self, bot: BotId) -> Option<Side> {
        if bot == self.pro_bot {
            Some(Side::Pro)
        } else if bot == self.con_bot {
            Some(Side::Con)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Pro.opponent(), Side::Con);
        assert_eq!(Side::Con.opponent(), Side::Pro);
    }

    #[test]
    fn test_status_terminality() {
        assert!(ContestStatus::Completed.is_terminal());
        assert!(ContestStatus::Cancelled.is_terminal());
        assert!(!ContestStatus::InProgress.is_terminal());
        assert!(!ContestStatus::Voting.is_terminal());
        assert!(!ContestStatus::Pending.is_terminal());
    }

    #[test]
    fn test_active_statuses() {
        assert!(ContestStatus::InProgress.is_active());
        assert!(ContestStatus::Voting.is_active());
        assert!(!ContestStatus::Pending.is_active());
        assert!(!ContestStatus::Completed.is_active());
    }

    #[test]
    fn test_new_contest_is_pending() {
        let c = Contest::new(
            BotId::new(),
            BotId::new(),
            TopicId::new(),
            PresetId::from("classic"),
            10,
        );
        assert_eq!(c.status, ContestStatus::Pending);
        assert_eq!(c.current_round, 0);
        assert_eq!(c.round_status, RoundStatus::Pending);
        assert!(c.winner.is_none());
        assert!(c.started_at.is_none());
    }

    #[test]
    fn test_bot_for_and_side_of() {
        let pro = BotId::new();
        let con = BotId::new();
        let c = Contest::new(pro, con, TopicId::new(), PresetId::from("classic"), 0);
        assert_eq!(c.bot_for(Side::Pro), pro);
        assert_eq!(c.bot_for(Side::Con), con);
        assert_eq!(c.side_of(pro), Some(Side::Pro));
        assert_eq!(c.side_of(con), Some(Side::Con));
        assert_eq!(c.side_of(BotId::new()), None);
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&ContestStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&RoundStatus::BotResponding).unwrap();
        assert_eq!(json, "\"bot_responding\"");
        let json = serde_json::to_string(&Side::Pro).unwrap();
        assert_eq!(json, "\"pro\"");
    }
}
