//! Queue state and the pairing sweep

use agora_core::{rating, BotId, PresetId, RatingConfig, Result, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Boxed future used by the matchmaker's injected callbacks.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Creates a contest for an accepted pair.
///
/// Entries are removed from the queue only when the creator returns `Ok`; a
/// failed creator leaves both entries eligible for the next sweep.
pub type PairCreator = Arc<dyn Fn(QueueEntry, QueueEntry) -> BoxFuture<Result<()>> + Send + Sync>;

/// Rejects bots that are no longer attached anywhere.
///
/// Evaluated at pairing time; an entry failing the check is removed from the
/// queue as a side effect.
pub type LivenessCheck = Arc<dyn Fn(BotId) -> BoxFuture<bool> + Send + Sync>;

/// Identity of one queue entry.
///
/// Distinct from the bot id: rejoining replaces the entry and invalidates the
/// old id, which is how a stale sweep proposal is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A waiting bot.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Entry identity; replaced on rejoin.
    pub entry_id: EntryId,
    /// The waiting bot.
    pub bot_id: BotId,
    /// The bot's owner, who receives payouts.
    pub user_id: UserId,
    /// Preset the bot wants to play.
    pub preset_id: PresetId,
    /// Rating at join time.
    pub rating: i32,
    /// Stake the bot brings.
    pub stake: i64,
    /// When the entry joined; wait time drives the window expansion.
    pub joined_at: Instant,
    /// Current acceptable rating window, recomputed by each sweep.
    pub expanded_range: u32,
}

#[derive(Default)]
struct QueueState {
    entries: HashMap<EntryId, QueueEntry>,
    by_bot: HashMap<BotId, EntryId>,
}

/// The per-instance matchmaking queue.
pub struct Matchmaker {
    state: Mutex<QueueState>,
    rating_cfg: RatingConfig,
    sweep_period: Duration,
}

impl Matchmaker {
    /// Create an empty queue.
    pub fn new(rating_cfg: RatingConfig, sweep_period: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            rating_cfg,
            sweep_period,
        }
    }

    /// Join the queue.
    ///
    /// A bot has at most one active entry: a second join replaces the first.
    /// The fresh entry starts at the base rating window.
    pub fn join(
        &self,
        bot_id: BotId,
        user_id: UserId,
        preset_id: PresetId,
        rating: i32,
        stake: i64,
    ) -> EntryId {
        let entry = QueueEntry {
            entry_id: EntryId::new(),
            bot_id,
            user_id,
            preset_id,
            rating,
            stake,
            joined_at: Instant::now(),
            expanded_range: self.rating_cfg.range_base,
        };
        let entry_id = entry.entry_id;

        let mut state = self.state.lock();
        if let Some(previous) = state.by_bot.insert(bot_id, entry_id) {
            state.entries.remove(&previous);
            debug!(target: "agora::matchmaker", bot_id = %bot_id, "replaced existing queue entry");
        }
        state.entries.insert(entry_id, entry);
        info!(
            target: "agora::matchmaker",
            bot_id = %bot_id,
            rating,
            stake,
            queued = state.entries.len(),
            "bot joined queue"
        );
        entry_id
    }

    /// Remove a bot's entry, if any. Idempotent.
    pub fn remove_bot(&self, bot_id: BotId) -> bool {
        let mut state = self.state.lock();
        match state.by_bot.remove(&bot_id) {
            Some(entry_id) => {
                state.entries.remove(&entry_id);
                debug!(target: "agora::matchmaker", bot_id = %bot_id, "bot left queue");
                true
            }
            None => false,
        }
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a bot is currently queued.
    pub fn contains_bot(&self, bot_id: BotId) -> bool {
        self.state.lock().by_bot.contains_key(&bot_id)
    }

    /// Snapshot of the queued bots.
    pub fn queued_bots(&self) -> Vec<BotId> {
        self.state.lock().by_bot.keys().copied().collect()
    }

    fn still_queued(&self, entry: &QueueEntry) -> bool {
        self.state.lock().entries.contains_key(&entry.entry_id)
    }

    fn remove_entry(&self, entry: &QueueEntry) {
        let mut state = self.state.lock();
        if state.entries.remove(&entry.entry_id).is_some() {
            // Only drop the bot index if it still points at this entry.
            if state.by_bot.get(&entry.bot_id) == Some(&entry.entry_id) {
                state.by_bot.remove(&entry.bot_id);
            }
        }
    }

    /// One pairing pass.
    ///
    /// Recomputes every entry's window from its wait time, proposes pairs
    /// longest-waiting-first, then processes each proposal: liveness failures
    /// drop the stale entry, a successful creation removes both entries, and
    /// a failed creator leaves them queued for the next sweep.
    pub async fn sweep(&self, creator: &PairCreator, liveness: Option<&LivenessCheck>) {
        let proposals = {
            let mut state = self.state.lock();
            let now = Instant::now();
            for entry in state.entries.values_mut() {
                let waited = now.duration_since(entry.joined_at).as_secs();
                entry.expanded_range = rating::expanded_range(waited, &self.rating_cfg);
            }
            let mut entries: Vec<QueueEntry> = state.entries.values().cloned().collect();
            entries.sort_by_key(|e| e.joined_at);
            propose_pairs(&entries)
        };

        for (a, b) in proposals {
            // Re-check under the lock: an earlier proposal, a leave, or a
            // disconnect may have consumed either entry since the snapshot.
            if !self.still_queued(&a) || !self.still_queued(&b) {
                continue;
            }

            if let Some(check) = liveness {
                let mut stale = false;
                if !check(a.bot_id).await {
                    warn!(target: "agora::matchmaker", bot_id = %a.bot_id, "dropping unreachable queue entry");
                    self.remove_entry(&a);
                    stale = true;
                }
                if !check(b.bot_id).await {
                    warn!(target: "agora::matchmaker", bot_id = %b.bot_id, "dropping unreachable queue entry");
                    self.remove_entry(&b);
                    stale = true;
                }
                if stale {
                    continue;
                }
            }

            match creator(a.clone(), b.clone()).await {
                Ok(()) => {
                    self.remove_entry(&a);
                    self.remove_entry(&b);
                    info!(
                        target: "agora::matchmaker",
                        pro = %a.bot_id,
                        con = %b.bot_id,
                        rating_gap = a.rating.abs_diff(b.rating),
                        "pair matched"
                    );
                }
                Err(e) => {
                    warn!(
                        target: "agora::matchmaker",
                        error = %e,
                        "pair creation failed; entries stay queued"
                    );
                }
            }
        }
    }

    /// Run the periodic sweep until shutdown.
    pub async fn run(
        self: Arc<Self>,
        creator: PairCreator,
        liveness: Option<LivenessCheck>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.sweep_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep(&creator, liveness.as_ref()).await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender also means the instance is going away.
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(target: "agora::matchmaker", "sweep loop stopped");
                        return;
                    }
                }
            }
        }
    }
}

/// Whether two entries may be paired.
fn compatible(a: &QueueEntry, b: &QueueEntry) -> bool {
    if a.entry_id == b.entry_id || a.preset_id != b.preset_id {
        return false;
    }
    let window = a.expanded_range.max(b.expanded_range);
    if !rating::balanced(a.rating, b.rating, window) {
        return false;
    }
    let max_stake = a.stake.max(b.stake);
    (a.stake - b.stake).abs() as f64 <= 0.2 * max_stake as f64
}

/// Propose pairs from entries sorted by join time.
///
/// For each unmatched entry in wait order, the best candidate is the
/// compatible unmatched entry with the smallest rating gap; the sort order
/// breaks remaining ties (strict `<` keeps the earlier candidate).
fn propose_pairs(entries: &[QueueEntry]) -> Vec<(QueueEntry, QueueEntry)> {
    let mut matched = vec![false; entries.len()];
    let mut pairs = Vec::new();

    for i in 0..entries.len() {
        if matched[i] {
            continue;
        }
        let mut best: Option<(usize, u32)> = None;
        for (j, candidate) in entries.iter().enumerate().skip(i + 1) {
            if matched[j] || !compatible(&entries[i], candidate) {
                continue;
            }
            let gap = entries[i].rating.abs_diff(candidate.rating);
            if best.map_or(true, |(_, best_gap)| gap < best_gap) {
                best = Some((j, gap));
            }
        }
        if let Some((j, _)) = best {
            matched[i] = true;
            matched[j] = true;
            pairs.push((entries[i].clone(), entries[j].clone()));
        }
    }
    pairs
}
