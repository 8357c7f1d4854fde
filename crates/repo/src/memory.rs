//! In-memory repository implementation
//!
//! One `MemoryStore` implements every repository trait over concurrent maps.
//! It plays the role of the shared database in single-node deployments and
//! in the test suites: the multi-instance harness hands the same `Arc` to
//! several simulated instances.
//!
//! Uniqueness constraints are enforced with entry-level locking the same way
//! unique indexes would reject a second insert.

use crate::traits::{
    BotRepository, ContestRepository, MessageRepository, Repositories, RoundResultRepository,
    TopicRepository, VoteRepository,
};
use agora_core::{
    Bot, BotId, Contest, ContestId, ContestStatus, Error, Result, RoundResult, RoundStatus, Side,
    StoredMessage, Topic, TopicId, Vote,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory implementation of all repository traits.
#[derive(Default)]
pub struct MemoryStore {
    contests: DashMap<ContestId, Contest>,
    messages: DashMap<ContestId, Vec<StoredMessage>>,
    votes: DashMap<(ContestId, u32), Mutex<HashMap<agora_core::UserId, Side>>>,
    results: DashMap<(ContestId, u32), RoundResult>,
    bots: DashMap<BotId, Bot>,
    tokens: DashMap<String, BotId>,
    topics: DashMap<TopicId, Topic>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Bundle a shared store as every repository.
    pub fn repositories(store: &Arc<Self>) -> Repositories {
        Repositories {
            contests: Arc::clone(store) as Arc<dyn ContestRepository>,
            messages: Arc::clone(store) as Arc<dyn MessageRepository>,
            votes: Arc::clone(store) as Arc<dyn VoteRepository>,
            round_results: Arc::clone(store) as Arc<dyn RoundResultRepository>,
            bots: Arc::clone(store) as Arc<dyn BotRepository>,
            topics: Arc::clone(store) as Arc<dyn TopicRepository>,
        }
    }

    fn update_contest<F>(&self, id: ContestId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Contest) -> Result<()>,
    {
        match self.contests.get_mut(&id) {
            Some(mut contest) => apply(&mut contest),
            None => Err(Error::ContestNotFound(id)),
        }
    }
}

#[async_trait]
impl ContestRepository for MemoryStore {
    async fn insert(&self, contest: &Contest) -> Result<()> {
        self.contests.insert(contest.id, contest.clone());
        Ok(())
    }

    async fn fetch(&self, id: ContestId) -> Result<Option<Contest>> {
        Ok(self.contests.get(&id).map(|c| c.clone()))
    }

    async fn mark_started(&self, id: ContestId, at: DateTime<Utc>) -> Result<()> {
        self.update_contest(id, |c| {
            if c.status != ContestStatus::Pending {
                return Err(Error::InvalidState(format!(
                    "contest {id} cannot start from {}",
                    c.status
                )));
            }
            c.status = ContestStatus::InProgress;
            c.started_at = Some(at);
            c.heartbeat_at = at;
            Ok(())
        })
    }

    async fn set_status(&self, id: ContestId, status: ContestStatus) -> Result<()> {
        self.update_contest(id, |c| {
            if c.status.is_terminal() && c.status != status {
                return Err(Error::InvalidState(format!(
                    "contest {id} is {} and cannot become {status}",
                    c.status
                )));
            }
            c.status = status;
            Ok(())
        })
    }

    async fn set_current_round(&self, id: ContestId, round: u32) -> Result<()> {
        self.update_contest(id, |c| {
            c.current_round = round;
            Ok(())
        })
    }

    async fn set_round_status(&self, id: ContestId, status: RoundStatus) -> Result<()> {
        self.update_contest(id, |c| {
            c.round_status = status;
            Ok(())
        })
    }

    async fn complete(&self, id: ContestId, winner: Side, at: DateTime<Utc>) -> Result<()> {
        self.update_contest(id, |c| {
            if c.status.is_terminal() {
                return Err(Error::InvalidState(format!(
                    "contest {id} is already {}",
                    c.status
                )));
            }
            c.status = ContestStatus::Completed;
            c.winner = Some(winner);
            c.completed_at = Some(at);
            Ok(())
        })
    }

    async fn touch_heartbeat(&self, id: ContestId, at: DateTime<Utc>) -> Result<()> {
        self.update_contest(id, |c| {
            c.heartbeat_at = at;
            Ok(())
        })
    }

    async fn set_spectator_count(&self, id: ContestId, count: u32) -> Result<()> {
        self.update_contest(id, |c| {
            c.spectator_count = count;
            Ok(())
        })
    }

    async fn list_active(&self) -> Result<Vec<Contest>> {
        Ok(self
            .contests
            .iter()
            .filter(|c| c.status.is_active())
            .map(|c| c.clone())
            .collect())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn append(&self, message: &StoredMessage) -> Result<()> {
        self.messages
            .entry(message.contest_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list(&self, contest: ContestId) -> Result<Vec<StoredMessage>> {
        let mut messages = self
            .messages
            .get(&contest)
            .map(|m| m.clone())
            .unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

#[async_trait]
impl VoteRepository for MemoryStore {
    async fn record(&self, vote: &Vote) -> Result<bool> {
        let entry = self
            .votes
            .entry((vote.contest_id, vote.round_index))
            .or_default();
        let mut voters = entry.lock();
        if voters.contains_key(&vote.voter_id) {
            // First submission wins.
            return Ok(false);
        }
        voters.insert(vote.voter_id, vote.choice);
        Ok(true)
    }

    async fn tally(&self, contest: ContestId, round: u32) -> Result<(u32, u32)> {
        match self.votes.get(&(contest, round)) {
            Some(entry) => {
                let voters = entry.lock();
                let pro = voters.values().filter(|&&c| c == Side::Pro).count() as u32;
                let con = voters.values().filter(|&&c| c == Side::Con).count() as u32;
                Ok((pro, con))
            }
            None => Ok((0, 0)),
        }
    }
}

#[async_trait]
impl RoundResultRepository for MemoryStore {
    async fn record(&self, result: &RoundResult) -> Result<bool> {
        use dashmap::mapref::entry::Entry;
        match self.results.entry((result.contest_id, result.round_index)) {
            Entry::Occupied(_) => {
                debug!(
                    target: "agora::repo",
                    contest_id = %result.contest_id,
                    round = result.round_index,
                    "round result already recorded"
                );
                Ok(false)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(result.clone());
                Ok(true)
            }
        }
    }

    async fn fetch(&self, contest: ContestId, round: u32) -> Result<Option<RoundResult>> {
        Ok(self.results.get(&(contest, round)).map(|r| r.clone()))
    }

    async fn list(&self, contest: ContestId) -> Result<Vec<RoundResult>> {
        let mut results: Vec<RoundResult> = self
            .results
            .iter()
            .filter(|entry| entry.key().0 == contest)
            .map(|entry| entry.value().clone())
            .collect();
        results.sort_by_key(|r| r.round_index);
        Ok(results)
    }
}

#[async_trait]
impl BotRepository for MemoryStore {
    async fn insert(&self, bot: &Bot, token: &str) -> Result<()> {
        self.bots.insert(bot.id, bot.clone());
        self.tokens.insert(token.to_string(), bot.id);
        Ok(())
    }

    async fn fetch(&self, id: BotId) -> Result<Option<Bot>> {
        Ok(self.bots.get(&id).map(|b| b.clone()))
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<Bot>> {
        match self.tokens.get(token) {
            Some(id) => Ok(self.bots.get(&id).map(|b| b.clone())),
            None => Ok(None),
        }
    }

    async fn apply_match_result(&self, id: BotId, won: bool, new_rating: i32) -> Result<()> {
        match self.bots.get_mut(&id) {
            Some(mut bot) => {
                if won {
                    bot.wins += 1;
                } else {
                    bot.losses += 1;
                }
                bot.rating = new_rating;
                Ok(())
            }
            None => Err(Error::BotNotFound(id)),
        }
    }
}

#[async_trait]
impl TopicRepository for MemoryStore {
    async fn insert(&self, topic: &Topic) -> Result<()> {
        self.topics.insert(topic.id, topic.clone());
        Ok(())
    }

    async fn fetch(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.topics.get(&id).map(|t| t.clone()))
    }

    async fn pick(&self) -> Result<Option<Topic>> {
        use rand::seq::IteratorRandom;

        let mut rng = rand::thread_rng();
        Ok(self.topics.iter().choose(&mut rng).map(|t| t.clone()))
    }
}
