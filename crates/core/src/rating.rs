//! Rating arithmetic and the expanding matchmaking window
//!
//! Standard Elo with integer ratings: `expected` gives the win probability
//! implied by a rating gap, `update` applies a rounded K-scaled adjustment and
//! clamps at zero. `expanded_range` grows a queue entry's acceptable rating
//! window with wait time so that long-waiting bots eventually match someone.

use serde::{Deserialize, Serialize};

/// Tunables for rating updates and the matchmaking window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingConfig {
    /// Elo K-factor.
    #[serde(default = "default_k")]
    pub k: u32,
    /// Rating window a fresh queue entry accepts.
    #[serde(default = "default_range_base")]
    pub range_base: u32,
    /// Window growth per 30 s of waiting.
    #[serde(default = "default_range_step")]
    pub range_step: u32,
    /// Maximum window.
    #[serde(default = "default_range_cap")]
    pub range_cap: u32,
}

fn default_k() -> u32 {
    32
}
fn default_range_base() -> u32 {
    100
}
fn default_range_step() -> u32 {
    50
}
fn default_range_cap() -> u32 {
    500
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            range_base: default_range_base(),
            range_step: default_range_step(),
            range_cap: default_range_cap(),
        }
    }
}

/// New ratings for both participants of a decided match.
///
/// Fields hold the post-match ratings, not the differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchDeltas {
    /// Winner's new rating.
    pub winner: i32,
    /// Loser's new rating.
    pub loser: i32,
}

/// Expected score of a player rated `r_a` against one rated `r_b`.
pub fn expected(r_a: i32, r_b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(r_b - r_a) / 400.0))
}

/// New rating after one result.
///
/// `score` is 1.0 for a win, 0.0 for a loss. The adjustment is rounded to the
/// nearest integer and the result clamps at zero.
pub fn update(rating: i32, opponent: i32, score: f64, k: u32) -> i32 {
    let delta = (f64::from(k) * (score - expected(rating, opponent))).round() as i32;
    (rating + delta).max(0)
}

/// New ratings for the winner and loser of a match.
pub fn match_deltas(winner: i32, loser: i32, k: u32) -> MatchDeltas {
    MatchDeltas {
        winner: update(winner, loser, 1.0, k),
        loser: update(loser, winner, 0.0, k),
    }
}

/// Rating window accepted after waiting `wait_seconds` in the queue.
///
/// Grows by `step` for every full 30 s waited, capped.
pub fn expanded_range(wait_seconds: u64, cfg: &RatingConfig) -> u32 {
    let steps = (wait_seconds / 30) as u32;
    cfg.range_base
        .saturating_add(cfg.range_step.saturating_mul(steps))
        .min(cfg.range_cap)
}

/// Whether two ratings are within `max` of each other.
pub fn balanced(a: i32, b: i32, max: u32) -> bool {
    a.abs_diff(b) <= max
}
