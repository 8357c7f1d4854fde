//! Round presets
//!
//! A preset is an immutable description of a contest's shape: the ordered
//! round list (speaker, time limit, word limits, exchange count), the prep
//! time before the first round, and the voting-window length after each
//! round. A contest snapshots its preset at start, so editing a preset never
//! affects a running contest.

use crate::ids::PresetId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who speaks in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// Only the pro side speaks.
    Pro,
    /// Only the con side speaks.
    Con,
    /// Both sides speak; pro always speaks first.
    Both,
}

/// Word-count bounds for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordLimit {
    /// Minimum words.
    pub min: u32,
    /// Maximum words.
    pub max: u32,
}

/// One round descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Round name shown to bots and spectators, e.g. `opening`.
    pub name: String,
    /// Who speaks.
    pub speaker: Speaker,
    /// Per-turn response deadline, in seconds.
    pub time_limit: u64,
    /// Word bounds for each turn.
    pub word_limit: WordLimit,
    /// How many times the speaker pattern repeats. Defaults to 1.
    #[serde(default = "default_exchanges")]
    pub exchanges: u32,
}

fn default_exchanges() -> u32 {
    1
}

impl RoundConfig {
    /// Response deadline as a `Duration`.
    pub fn time_limit_duration(&self) -> Duration {
        Duration::from_secs(self.time_limit)
    }

    /// Messages one full pass of this round produces.
    pub fn messages_per_round(&self) -> u32 {
        let per_exchange = match self.speaker {
            Speaker::Pro | Speaker::Con => 1,
            Speaker::Both => 2,
        };
        per_exchange * self.exchanges.max(1)
    }
}

/// An immutable contest shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Preset identifier, e.g. `classic`.
    pub id: PresetId,
    /// Human-readable name.
    pub name: String,
    /// Ordered round descriptors.
    pub rounds: Vec<RoundConfig>,
    /// Seconds between `debate_started` and the first round.
    pub prep_time: u64,
    /// Voting-window length after each round, in seconds.
    pub vote_window: u64,
}

impl Preset {
    /// Prep time as a `Duration`.
    pub fn prep_time_duration(&self) -> Duration {
        Duration::from_secs(self.prep_time)
    }

    /// Voting window as a `Duration`.
    pub fn vote_window_duration(&self) -> Duration {
        Duration::from_secs(self.vote_window)
    }

    /// Number of rounds.
    pub fn round_count(&self) -> u32 {
        self.rounds.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(speaker: Speaker, exchanges: u32) -> RoundConfig {
        RoundConfig {
            name: "opening".to_string(),
            speaker,
            time_limit: 60,
            word_limit: WordLimit { min: 50, max: 250 },
            exchanges,
        }
    }

    #[test]
    fn test_messages_per_round() {
        assert_eq!(round(Speaker::Pro, 1).messages_per_round(), 1);
        assert_eq!(round(Speaker::Con, 1).messages_per_round(), 1);
        assert_eq!(round(Speaker::Both, 1).messages_per_round(), 2);
        assert_eq!(round(Speaker::Both, 2).messages_per_round(), 4);
        // A zero exchange count still runs once
        assert_eq!(round(Speaker::Both, 0).messages_per_round(), 2);
    }

    #[test]
    fn test_exchanges_default_from_toml() {
        let cfg: RoundConfig = toml::from_str(
            r#"
            name = "rebuttal"
            speaker = "both"
            time_limit = 90
            word_limit = { min = 50, max = 300 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.exchanges, 1);
        assert_eq!(cfg.speaker, Speaker::Both);
    }

    #[test]
    fn test_durations() {
        let preset = Preset {
            id: PresetId::from("classic"),
            name: "Classic".to_string(),
            rounds: vec![round(Speaker::Both, 1)],
            prep_time: 5,
            vote_window: 20,
        };
        assert_eq!(preset.prep_time_duration(), Duration::from_secs(5));
        assert_eq!(preset.vote_window_duration(), Duration::from_secs(20));
        assert_eq!(preset.round_count(), 1);
    }
}
