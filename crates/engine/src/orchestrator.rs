//! The per-contest state machine
//!
//! One task drives each active contest on its owning instance:
//!
//! ```text
//!  pending ──start──▶ in_progress ──(per round)──▶ in_progress ──finalize──▶ completed
//!      │                   │                                                   ▲
//!      └────cancel─────────┴──cancel──▶ cancelled                              │
//!                                                                              │
//!  round: pending ─▶ bot_responding ─▶ voting ─▶ completed ──(i<last? next : ─┘)
//! ```
//!
//! The run task owns the contest's in-memory state outright. Voting is the
//! one concurrent input: `submit_vote` is gated by a small shared structure
//! (current round + round phase) and lands in the authoritative vote store,
//! which the run task re-reads when closing the window. Bot failures of any
//! kind become bracketed fallback content; a contest always makes progress.

use crate::broadcaster::{SpectatorBroadcaster, SpectatorReceiver};
use crate::settlement::StakeSettlement;
use agora_core::{
    rating, Bot, BotId, CharLimit, Contest, ContestId, ContestStatus, DebateRequest, Error,
    InstanceId, MatchScore, Preset, RatingConfig, RatingDeltas, RequestId, Result, RoundConfig,
    RoundResult, RoundStatus, ServerToBot, Side, Speaker, SpectatorEvent, StoredMessage, Topic,
    TopicId, TranscriptEntry, UserId, Vote,
};
use agora_ownership::{ContestHost, OwnershipManager};
use agora_repo::{PresetRegistry, Repositories};
use agora_transport::BotHub;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Stable error code for cancelled contests.
pub const CODE_DEBATE_CANCELLED: &str = "DEBATE_CANCELLED";

/// Shared gate the vote path checks against the run task's progress.
struct VoteGate {
    current_round: AtomicU32,
    status: Mutex<RoundStatus>,
    /// In-memory mirror of this round's votes; the database stays
    /// authoritative for tallies.
    votes: Mutex<HashMap<UserId, Side>>,
}

impl VoteGate {
    fn new(round: u32) -> Self {
        Self {
            current_round: AtomicU32::new(round),
            status: Mutex::new(RoundStatus::Pending),
            votes: Mutex::new(HashMap::new()),
        }
    }

    fn set_round(&self, round: u32) {
        self.current_round.store(round, Ordering::SeqCst);
        *self.status.lock() = RoundStatus::Pending;
    }

    fn set_status(&self, status: RoundStatus) {
        *self.status.lock() = status;
    }

    fn open_voting(&self) {
        self.votes.lock().clear();
        *self.status.lock() = RoundStatus::Voting;
    }

    fn accepts(&self, round: u32) -> bool {
        self.current_round.load(Ordering::SeqCst) == round
            && *self.status.lock() == RoundStatus::Voting
    }

    fn record(&self, voter: UserId, choice: Side) {
        self.votes.lock().insert(voter, choice);
    }
}

#[derive(Clone)]
struct ActiveContest {
    gate: Arc<VoteGate>,
    cancelled: Arc<AtomicBool>,
}

impl ActiveContest {
    fn new(round: u32) -> Self {
        Self {
            gate: Arc::new(VoteGate::new(round)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// In-memory working state, owned by the run task.
struct ContestState {
    contest: Contest,
    preset: Preset,
    pro: Bot,
    con: Bot,
    topic: Topic,
    messages: Vec<StoredMessage>,
}

impl ContestState {
    fn bot_for(&self, side: Side) -> &Bot {
        match side {
            Side::Pro => &self.pro,
            Side::Con => &self.con,
        }
    }

    fn round_name(&self, index: u32) -> String {
        self.preset
            .rounds
            .get(index as usize)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| index.to_string())
    }
}

/// The contest orchestrator for one instance.
pub struct Orchestrator {
    instance_id: InstanceId,
    repos: Repositories,
    presets: Arc<PresetRegistry>,
    hub: Arc<BotHub>,
    ownership: Arc<OwnershipManager>,
    broadcaster: Arc<SpectatorBroadcaster>,
    settlement: Arc<dyn StakeSettlement>,
    rating_cfg: RatingConfig,
    active: DashMap<ContestId, ActiveContest>,
}

impl Orchestrator {
    /// Wire up the orchestrator.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        repos: Repositories,
        presets: Arc<PresetRegistry>,
        hub: Arc<BotHub>,
        ownership: Arc<OwnershipManager>,
        broadcaster: Arc<SpectatorBroadcaster>,
        settlement: Arc<dyn StakeSettlement>,
        rating_cfg: RatingConfig,
    ) -> Self {
        Self {
            instance_id,
            repos,
            presets,
            hub,
            ownership,
            broadcaster,
            settlement,
            rating_cfg,
            active: DashMap::new(),
        }
    }

    /// Contests active in memory on this instance.
    pub fn active_contests(&self) -> Vec<ContestId> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }

    /// Whether a contest is active in memory here.
    pub fn is_active(&self, contest: ContestId) -> bool {
        self.active.contains_key(&contest)
    }

    /// Create a contest row in `pending`.
    pub async fn create(
        &self,
        pro_bot: BotId,
        con_bot: BotId,
        topic: TopicId,
        stake: i64,
        preset_id: &agora_core::PresetId,
    ) -> Result<Contest> {
        if !self.presets.contains(preset_id) {
            return Err(Error::UnknownPreset(preset_id.clone()));
        }
        let contest = Contest::new(pro_bot, con_bot, topic, preset_id.clone(), stake);
        self.repos.contests.insert(&contest).await?;
        info!(
            target: "agora::engine",
            contest_id = %contest.id,
            pro = %pro_bot,
            con = %con_bot,
            stake,
            "contest created"
        );
        Ok(contest)
    }

    /// Drive a pending contest to its terminal state.
    ///
    /// Claims ownership, announces the start, sleeps the prep time, then
    /// runs every round and finalizes. Runs on the caller's task; spawn it.
    pub async fn start(&self, contest: Contest) -> Result<()> {
        let contest_id = contest.id;
        let preset = self.presets.get(&contest.preset)?;
        let pro = self
            .repos
            .bots
            .fetch(contest.pro_bot)
            .await?
            .ok_or(Error::BotNotFound(contest.pro_bot))?;
        let con = self
            .repos
            .bots
            .fetch(contest.con_bot)
            .await?
            .ok_or(Error::BotNotFound(contest.con_bot))?;
        let topic = self
            .repos
            .topics
            .fetch(contest.topic)
            .await?
            .ok_or(Error::TopicNotFound(contest.topic))?;

        let now = Utc::now();
        self.repos.contests.mark_started(contest_id, now).await?;
        if !self.ownership.claim(contest_id).await? {
            return Err(Error::AlreadyOwned);
        }

        let entry = ActiveContest::new(0);
        self.active.insert(contest_id, entry.clone());
        // This instance is the owner; a relay left over from pre-start
        // spectators would duplicate every frame.
        self.broadcaster.stop_relay(contest_id);

        let mut state = ContestState {
            contest: Contest {
                status: ContestStatus::InProgress,
                started_at: Some(now),
                ..contest
            },
            preset,
            pro,
            con,
            topic,
            messages: Vec::new(),
        };

        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::DebateStarted {
                    topic: state.topic.text.clone(),
                    pro_bot: state.pro.name.clone(),
                    con_bot: state.con.name.clone(),
                    rounds: state.preset.round_count(),
                    stake: state.contest.stake,
                },
            )
            .await;
        info!(target: "agora::engine", contest_id = %contest_id, "debate started");

        tokio::time::sleep(state.preset.prep_time_duration()).await;

        if let Err(e) = self.run_contest(&mut state, &entry, 0, false).await {
            error!(target: "agora::engine", contest_id = %contest_id, error = %e, "contest run failed");
            self.active.remove(&contest_id);
            let _ = self.ownership.release(contest_id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Run rounds `start_round..` and finalize.
    ///
    /// `skip_bots_first` resumes a recovered round straight at its voting
    /// window when its turns were already persisted.
    async fn run_contest(
        &self,
        state: &mut ContestState,
        entry: &ActiveContest,
        start_round: u32,
        skip_bots_first: bool,
    ) -> Result<()> {
        let round_count = state.preset.round_count();
        for i in start_round..round_count {
            if entry.is_cancelled() {
                debug!(target: "agora::engine", contest_id = %state.contest.id, "run loop observed cancellation");
                return Ok(());
            }
            state.contest.current_round = i;
            entry.gate.set_round(i);
            self.repos
                .contests
                .set_current_round(state.contest.id, i)
                .await?;

            let cfg = state.preset.rounds[i as usize].clone();
            let skip_bots = skip_bots_first && i == start_round;
            match self.run_round(state, entry, i, &cfg, skip_bots).await {
                Ok(()) => {}
                // A cancel that landed mid-round already wrote the terminal
                // status; the failed write is the exit signal, not an error.
                Err(e) if entry.is_cancelled() => {
                    debug!(target: "agora::engine", contest_id = %state.contest.id, error = %e, "round aborted by cancellation");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        if entry.is_cancelled() {
            return Ok(());
        }
        self.finalize(state).await
    }

    /// One round: bot turns, then the voting window, then the result record.
    async fn run_round(
        &self,
        state: &mut ContestState,
        entry: &ActiveContest,
        index: u32,
        cfg: &RoundConfig,
        skip_bots: bool,
    ) -> Result<()> {
        let contest_id = state.contest.id;
        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::RoundStarted {
                    round: cfg.name.clone(),
                    round_index: index,
                    time_limit: cfg.time_limit,
                },
            )
            .await;

        if !skip_bots {
            entry.gate.set_status(RoundStatus::BotResponding);
            state.contest.round_status = RoundStatus::BotResponding;
            self.repos
                .contests
                .set_round_status(contest_id, RoundStatus::BotResponding)
                .await?;

            for _ in 0..cfg.exchanges.max(1) {
                match cfg.speaker {
                    Speaker::Pro => self.take_turn(state, index, cfg, Side::Pro).await?,
                    Speaker::Con => self.take_turn(state, index, cfg, Side::Con).await?,
                    Speaker::Both => {
                        // Pro always speaks first.
                        self.take_turn(state, index, cfg, Side::Pro).await?;
                        self.take_turn(state, index, cfg, Side::Con).await?;
                    }
                }
            }
        }

        // Voting window. Votes land in the database; the in-memory mirror
        // only serves the gate.
        entry.gate.open_voting();
        state.contest.round_status = RoundStatus::Voting;
        self.repos
            .contests
            .set_round_status(contest_id, RoundStatus::Voting)
            .await?;
        state.contest.status = ContestStatus::Voting;
        self.repos
            .contests
            .set_status(contest_id, ContestStatus::Voting)
            .await?;
        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::VotingStarted {
                    round_index: index,
                    time_limit: state.preset.vote_window,
                },
            )
            .await;

        for _ in 0..state.preset.vote_window {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let (pro_votes, con_votes) = self.repos.votes.tally(contest_id, index).await?;
            self.broadcaster
                .broadcast(
                    contest_id,
                    SpectatorEvent::VoteUpdate {
                        round_index: index,
                        pro_votes,
                        con_votes,
                    },
                )
                .await;
        }

        let (pro_votes, con_votes) = self.repos.votes.tally(contest_id, index).await?;
        let winner = RoundResult::decide_winner(pro_votes, con_votes);
        let result = RoundResult {
            contest_id,
            round_index: index,
            pro_votes,
            con_votes,
            winner,
        };
        // Idempotent: a recovered re-run keeps the first record.
        self.repos.round_results.record(&result).await?;

        let score = self.cumulative_score(contest_id).await?;
        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::RoundEnded {
                    round: cfg.name.clone(),
                    round_index: index,
                    pro_votes,
                    con_votes,
                    winner,
                    score,
                },
            )
            .await;
        info!(
            target: "agora::engine",
            contest_id = %contest_id,
            round = index,
            pro_votes,
            con_votes,
            winner = %winner,
            "round ended"
        );

        entry.gate.set_status(RoundStatus::Completed);
        state.contest.round_status = RoundStatus::Completed;
        self.repos
            .contests
            .set_round_status(contest_id, RoundStatus::Completed)
            .await?;
        state.contest.status = ContestStatus::InProgress;
        self.repos
            .contests
            .set_status(contest_id, ContestStatus::InProgress)
            .await?;
        Ok(())
    }

    /// Ask one bot for its turn; any failure becomes fallback content.
    async fn take_turn(
        &self,
        state: &mut ContestState,
        index: u32,
        cfg: &RoundConfig,
        side: Side,
    ) -> Result<()> {
        let contest_id = state.contest.id;
        let bot = state.bot_for(side).clone();
        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::BotTyping {
                    position: side,
                    bot_id: bot.id,
                },
            )
            .await;

        let request = DebateRequest {
            // Assigned by the hub.
            request_id: RequestId::from_raw(""),
            debate_id: contest_id.to_string(),
            round: cfg.name.clone(),
            round_index: index,
            topic: state.topic.text.clone(),
            position: side,
            opponent_last_message: state
                .messages
                .iter()
                .rev()
                .find(|m| m.position == side.opponent())
                .map(|m| m.content.clone()),
            time_limit_seconds: cfg.time_limit,
            word_limit: cfg.word_limit,
            char_limit: CharLimit::from_word_limit(cfg.word_limit),
            messages_so_far: state
                .messages
                .iter()
                .map(|m| TranscriptEntry {
                    round: state.round_name(m.round_index),
                    position: m.position,
                    content: m.content.clone(),
                })
                .collect(),
        };

        let content = match self
            .hub
            .request(bot.id, request, cfg.time_limit_duration())
            .await
        {
            Ok(reply) => reply.message,
            Err(e) => {
                warn!(
                    target: "agora::engine",
                    contest_id = %contest_id,
                    bot_id = %bot.id,
                    position = %side,
                    error = %e,
                    "bot turn failed; using fallback content"
                );
                format!("[Bot failed to respond: {e}]")
            }
        };

        let message = StoredMessage {
            contest_id,
            round_index: index,
            position: side,
            bot_id: bot.id,
            content: content.clone(),
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        self.repos.messages.append(&message).await?;

        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::BotMessage {
                    round: cfg.name.clone(),
                    round_index: index,
                    position: side,
                    bot_id: bot.id,
                    content,
                    is_complete: true,
                },
            )
            .await;
        Ok(())
    }

    async fn cumulative_score(&self, contest: ContestId) -> Result<MatchScore> {
        let results = self.repos.round_results.list(contest).await?;
        Ok(MatchScore {
            pro: results.iter().filter(|r| r.winner == Side::Pro).count() as u32,
            con: results.iter().filter(|r| r.winner == Side::Con).count() as u32,
        })
    }

    /// Close out a finished contest: overall winner, ratings, stakes,
    /// notifications, release.
    async fn finalize(&self, state: &mut ContestState) -> Result<()> {
        let contest_id = state.contest.id;
        let score = self.cumulative_score(contest_id).await?;
        // Majority of round winners; pro carries ties here too.
        let winner_side = if score.pro >= score.con {
            Side::Pro
        } else {
            Side::Con
        };
        let (winner_bot, loser_bot) = match winner_side {
            Side::Pro => (state.pro.clone(), state.con.clone()),
            Side::Con => (state.con.clone(), state.pro.clone()),
        };

        let deltas = rating::match_deltas(winner_bot.rating, loser_bot.rating, self.rating_cfg.k);
        let winner_change = deltas.winner - winner_bot.rating;
        let loser_change = deltas.loser - loser_bot.rating;
        self.repos
            .bots
            .apply_match_result(winner_bot.id, true, deltas.winner)
            .await?;
        self.repos
            .bots
            .apply_match_result(loser_bot.id, false, deltas.loser)
            .await?;

        let payouts = match self
            .settlement
            .settle(&state.contest, winner_side, &winner_bot, &loser_bot)
            .await
        {
            Ok(payouts) => payouts,
            Err(e) => {
                warn!(target: "agora::engine", contest_id = %contest_id, error = %e, "stake settlement failed");
                Vec::new()
            }
        };

        self.repos
            .contests
            .complete(contest_id, winner_side, Utc::now())
            .await?;
        state.contest.status = ContestStatus::Completed;
        state.contest.winner = Some(winner_side);

        let rating_deltas = match winner_side {
            Side::Pro => RatingDeltas {
                pro: winner_change,
                con: loser_change,
            },
            Side::Con => RatingDeltas {
                pro: loser_change,
                con: winner_change,
            },
        };
        self.broadcaster
            .broadcast(
                contest_id,
                SpectatorEvent::DebateEnded {
                    winner: winner_side,
                    final_score: score,
                    rating_deltas,
                    payouts: payouts.clone(),
                },
            )
            .await;
        info!(
            target: "agora::engine",
            contest_id = %contest_id,
            winner = %winner_side,
            pro_rounds = score.pro,
            con_rounds = score.con,
            "debate ended"
        );

        // Best-effort result notifications, wherever each bot is attached.
        let _ = self
            .hub
            .notify_debate_complete(
                state.pro.id,
                ServerToBot::DebateComplete {
                    debate_id: contest_id,
                    won: Some(winner_side == Side::Pro),
                    elo_change: rating_deltas.pro,
                },
            )
            .await;
        let _ = self
            .hub
            .notify_debate_complete(
                state.con.id,
                ServerToBot::DebateComplete {
                    debate_id: contest_id,
                    won: Some(winner_side == Side::Con),
                    elo_change: rating_deltas.con,
                },
            )
            .await;

        self.active.remove(&contest_id);
        self.ownership.release(contest_id).await?;
        self.broadcaster.forget(contest_id);
        Ok(())
    }

    /// Record a spectator vote.
    ///
    /// Accepted only while this instance drives the contest, the round index
    /// matches, and the round is in its voting window. Duplicates and gate
    /// misses return `Ok(false)` with no side effects.
    pub async fn submit_vote(
        &self,
        contest: ContestId,
        round: u32,
        voter: UserId,
        choice: Side,
    ) -> Result<bool> {
        let entry = match self.active.get(&contest) {
            Some(entry) => entry.clone(),
            None => return Ok(false),
        };
        if !entry.gate.accepts(round) {
            return Ok(false);
        }
        let vote = Vote {
            contest_id: contest,
            round_index: round,
            voter_id: voter,
            choice,
        };
        let recorded = self.repos.votes.record(&vote).await?;
        if recorded {
            entry.gate.record(voter, choice);
        }
        Ok(recorded)
    }

    /// Cancel an active contest.
    ///
    /// Emits the error envelope, writes the terminal status, detaches from
    /// memory, and releases ownership. The run task observes the flag and
    /// exits after its current round. Returns false when the contest is not
    /// active here.
    pub async fn cancel(&self, contest: ContestId, reason: &str) -> Result<bool> {
        let entry = match self.active.get(&contest) {
            Some(entry) => entry.clone(),
            None => return Ok(false),
        };
        entry.cancelled.store(true, Ordering::SeqCst);

        self.broadcaster
            .broadcast(
                contest,
                SpectatorEvent::Error {
                    code: CODE_DEBATE_CANCELLED.to_string(),
                    message: reason.to_string(),
                },
            )
            .await;
        if let Err(e) = self
            .repos
            .contests
            .set_status(contest, ContestStatus::Cancelled)
            .await
        {
            warn!(target: "agora::engine", contest_id = %contest, error = %e, "cancel status write failed");
        }
        self.active.remove(&contest);
        self.ownership.release(contest).await?;
        self.broadcaster.forget(contest);
        info!(target: "agora::engine", contest_id = %contest, reason, "contest cancelled");
        Ok(true)
    }

    /// Adopt a contest this instance just claimed.
    ///
    /// Re-hydrates the row, transcript, results, participants, and topic;
    /// resumes at the first round with no result record (skipping the bot
    /// phase when its turns already exist), or goes straight to finalization
    /// when every round closed before the crash. Returns false when there is
    /// nothing to recover. The caller holds the ownership lease.
    pub async fn recover(self: Arc<Self>, contest: ContestId) -> Result<bool> {
        let row = match self.repos.contests.fetch(contest).await? {
            Some(row) => row,
            None => return Ok(false),
        };
        if !row.status.is_active() || self.active.contains_key(&contest) {
            return Ok(false);
        }

        let preset = self.presets.get(&row.preset)?;
        let pro = self
            .repos
            .bots
            .fetch(row.pro_bot)
            .await?
            .ok_or(Error::BotNotFound(row.pro_bot))?;
        let con = self
            .repos
            .bots
            .fetch(row.con_bot)
            .await?
            .ok_or(Error::BotNotFound(row.con_bot))?;
        let topic = self
            .repos
            .topics
            .fetch(row.topic)
            .await?
            .ok_or(Error::TopicNotFound(row.topic))?;
        let messages = self.repos.messages.list(contest).await?;
        let results = self.repos.round_results.list(contest).await?;

        let closed: std::collections::HashSet<u32> =
            results.iter().map(|r| r.round_index).collect();
        let resume = (0..preset.round_count()).find(|i| !closed.contains(i));

        // Skip the bot phase when the resumed round's turns are all on
        // record; only its voting window needs to re-run.
        let skip_bots = match resume {
            Some(i) => {
                let have = messages.iter().filter(|m| m.round_index == i).count() as u32;
                have >= preset.rounds[i as usize].messages_per_round()
            }
            None => false,
        };

        let entry = ActiveContest::new(resume.unwrap_or(preset.round_count()));
        self.active.insert(contest, entry.clone());
        // This instance owns the contest now; a stale relay would duplicate
        // frames for local spectators.
        self.broadcaster.stop_relay(contest);

        let mut state = ContestState {
            contest: row,
            preset,
            pro,
            con,
            topic,
            messages,
        };

        self.broadcaster
            .broadcast(
                contest,
                SpectatorEvent::DebateResumed {
                    round_index: resume.unwrap_or(state.preset.round_count()),
                    instance: self.instance_id.clone(),
                },
            )
            .await;
        info!(
            target: "agora::engine",
            contest_id = %contest,
            resume_round = ?resume,
            skip_bots,
            "contest recovered"
        );

        let this = Arc::clone(&self);
        tokio::spawn(async move {
            let outcome = match resume {
                Some(i) => this.run_contest(&mut state, &entry, i, skip_bots).await,
                None => this.finalize(&mut state).await,
            };
            if let Err(e) = outcome {
                error!(target: "agora::engine", contest_id = %contest, error = %e, "recovered contest failed");
                this.active.remove(&contest);
                let _ = this.ownership.release(contest).await;
            }
        });
        Ok(true)
    }

    /// Add a spectator. Returns the sink id and the frame receiver.
    ///
    /// Watching a contest owned elsewhere starts the bus relay for it.
    pub async fn spectator_join(&self, contest: ContestId) -> Result<(u64, SpectatorReceiver)> {
        let (sink_id, rx, count) = self.broadcaster.join(contest);
        if !self.is_active(contest) {
            Arc::clone(&self.broadcaster)
                .ensure_remote_watch(contest)
                .await;
        }
        self.note_spectator_count(contest, count as u32).await;
        Ok((sink_id, rx))
    }

    /// Remove a spectator.
    pub async fn spectator_leave(&self, contest: ContestId, sink_id: u64) {
        let count = self.broadcaster.leave(contest, sink_id);
        self.note_spectator_count(contest, count as u32).await;
    }

    async fn note_spectator_count(&self, contest: ContestId, count: u32) {
        if let Err(e) = self
            .repos
            .contests
            .set_spectator_count(contest, count)
            .await
        {
            debug!(target: "agora::engine", contest_id = %contest, error = %e, "spectator count write skipped");
        }
        let event = SpectatorEvent::SpectatorCount { count };
        if self.is_active(contest) {
            self.broadcaster.broadcast(contest, event).await;
        } else {
            self.broadcaster.broadcast_local(&agora_core::SpectatorFrame {
                debate_id: contest,
                event,
            });
        }
    }
}

/// Adapter exposing the orchestrator to the ownership manager.
pub struct EngineHost(pub Arc<Orchestrator>);

#[async_trait]
impl ContestHost for EngineHost {
    fn active_contests(&self) -> Vec<ContestId> {
        self.0.active_contests()
    }

    fn is_active(&self, contest: ContestId) -> bool {
        self.0.is_active(contest)
    }

    async fn recover(&self, contest: ContestId) -> Result<bool> {
        Arc::clone(&self.0).recover(contest).await
    }
}
