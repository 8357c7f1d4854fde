//! Wire envelopes
//!
//! Three families of tagged JSON envelopes:
//!
//! - [`ServerToBot`] / [`BotToServer`]: the persistent bot connection.
//! - [`SpectatorFrame`]: events fanned out to spectators, each carrying the
//!   contest id, a `type` tag, and a `payload`.
//! - [`InstanceMessage`] / [`ResponseMessage`]: inter-instance bus traffic
//!   for routing bot requests to the instance holding the connection.
//!
//! Field names are part of the external contract and are pinned with serde
//! renames; the mix of camelCase and snake_case is inherited from the wire
//! format and must not be "cleaned up".

use crate::contest::Side;
use crate::ids::{BotId, ContestId, InstanceId, PresetId, RequestId};
use crate::preset::WordLimit;
use crate::records::Payout;
use serde::{Deserialize, Serialize};

/// Character-count bounds derived from a round's word limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharLimit {
    /// Minimum characters (word minimum × 4).
    pub min: u32,
    /// Maximum characters (word maximum × 7).
    pub max: u32,
}

impl CharLimit {
    /// Derive character bounds from word bounds.
    pub fn from_word_limit(words: WordLimit) -> Self {
        Self {
            min: words.min.saturating_mul(4),
            max: words.max.saturating_mul(7),
        }
    }
}

/// A prior turn, projected for the bot request transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Round name the turn was spoken in.
    pub round: String,
    /// Which side spoke.
    pub position: Side,
    /// Turn content.
    pub content: String,
}

/// A request for one debate turn, sent to a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRequest {
    /// Correlation id; the reply must echo it.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// Contest id in string form.
    pub debate_id: String,
    /// Round name, e.g. `opening`.
    pub round: String,
    /// Round index (0-based).
    #[serde(rename = "roundIndex")]
    pub round_index: u32,
    /// Topic text.
    pub topic: String,
    /// Side the bot argues.
    pub position: Side,
    /// Last prior message by the opposing side, across all rounds.
    pub opponent_last_message: Option<String>,
    /// Response deadline in seconds.
    pub time_limit_seconds: u64,
    /// Word bounds for the turn.
    pub word_limit: WordLimit,
    /// Character bounds for the turn.
    pub char_limit: CharLimit,
    /// Ordered transcript of all prior turns.
    pub messages_so_far: Vec<TranscriptEntry>,
}

/// Envelopes sent from the platform to a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerToBot {
    /// Welcome, sent once after a successful attach.
    Connected {
        /// Attached bot id.
        #[serde(rename = "botId")]
        bot_id: BotId,
        /// Attached bot display name.
        #[serde(rename = "botName")]
        bot_name: String,
    },
    /// Heartbeat probe.
    Ping,
    /// A turn request.
    DebateRequest(DebateRequest),
    /// Final result notification for a contest the bot took part in.
    DebateComplete {
        /// Contest id.
        #[serde(rename = "debateId")]
        debate_id: ContestId,
        /// Whether this bot won. `None` for a cancelled contest.
        won: Option<bool>,
        /// Rating change applied to this bot.
        #[serde(rename = "eloChange")]
        elo_change: i32,
    },
}

/// Envelopes received from a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotToServer {
    /// Heartbeat reply; refreshes the attachment TTL.
    Pong,
    /// Reply to a [`ServerToBot::DebateRequest`].
    DebateResponse {
        /// Echoed correlation id.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Turn content. Must be non-empty.
        message: String,
        /// Optional self-assessed confidence in [0, 1].
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    /// Ask to join the matchmaking queue.
    QueueJoin {
        /// Stake to bring; the instance default when absent.
        #[serde(default)]
        stake: Option<i64>,
        /// Preset to queue for; the instance default when absent.
        #[serde(rename = "presetId", default)]
        preset_id: Option<PresetId>,
    },
    /// Leave the matchmaking queue.
    QueueLeave,
}

/// Cumulative per-side round wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Rounds won by pro.
    pub pro: u32,
    /// Rounds won by con.
    pub con: u32,
}

/// Rating changes applied to each side at completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDeltas {
    /// Pro's rating change.
    pub pro: i32,
    /// Con's rating change.
    pub con: i32,
}

/// Events broadcast to spectators of one contest.
///
/// Serialized inside a [`SpectatorFrame`] as `{"debateId", "type", "payload"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SpectatorEvent {
    /// The contest left `pending`.
    DebateStarted {
        /// Topic text.
        topic: String,
        /// Pro bot display name.
        #[serde(rename = "proBot")]
        pro_bot: String,
        /// Con bot display name.
        #[serde(rename = "conBot")]
        con_bot: String,
        /// Number of rounds in the preset.
        rounds: u32,
        /// Stake per side.
        stake: i64,
    },
    /// A round began.
    RoundStarted {
        /// Round name.
        round: String,
        /// Round index.
        #[serde(rename = "roundIndex")]
        round_index: u32,
        /// Per-turn deadline in seconds.
        #[serde(rename = "timeLimit")]
        time_limit: u64,
    },
    /// A bot was asked for its turn.
    BotTyping {
        /// Which side.
        position: Side,
        /// The bot asked.
        #[serde(rename = "botId")]
        bot_id: BotId,
    },
    /// A turn was produced (possibly fallback content).
    BotMessage {
        /// Round name.
        round: String,
        /// Round index.
        #[serde(rename = "roundIndex")]
        round_index: u32,
        /// Which side spoke.
        position: Side,
        /// The speaking bot.
        #[serde(rename = "botId")]
        bot_id: BotId,
        /// Turn content.
        content: String,
        /// Always true; reserved for streaming delivery.
        #[serde(rename = "isComplete")]
        is_complete: bool,
    },
    /// The round's voting window opened.
    VotingStarted {
        /// Round index votes apply to.
        #[serde(rename = "roundIndex")]
        round_index: u32,
        /// Window length in seconds.
        #[serde(rename = "timeLimit")]
        time_limit: u64,
    },
    /// Periodic tally while the window is open.
    VoteUpdate {
        /// Round index.
        #[serde(rename = "roundIndex")]
        round_index: u32,
        /// Current pro tally.
        #[serde(rename = "proVotes")]
        pro_votes: u32,
        /// Current con tally.
        #[serde(rename = "conVotes")]
        con_votes: u32,
    },
    /// A round closed with a result.
    RoundEnded {
        /// Round name.
        round: String,
        /// Round index.
        #[serde(rename = "roundIndex")]
        round_index: u32,
        /// Final pro tally.
        #[serde(rename = "proVotes")]
        pro_votes: u32,
        /// Final con tally.
        #[serde(rename = "conVotes")]
        con_votes: u32,
        /// Round winner.
        winner: Side,
        /// Cumulative round wins so far.
        score: MatchScore,
    },
    /// The contest completed.
    DebateEnded {
        /// Overall winner.
        winner: Side,
        /// Final per-side round wins.
        #[serde(rename = "finalScore")]
        final_score: MatchScore,
        /// Rating changes applied.
        #[serde(rename = "ratingDeltas")]
        rating_deltas: RatingDeltas,
        /// Settlement payouts.
        payouts: Vec<Payout>,
    },
    /// Spectator count changed on some instance.
    SpectatorCount {
        /// Current count.
        count: u32,
    },
    /// A new owner resumed the contest after recovery.
    DebateResumed {
        /// Round the run loop resumes at.
        #[serde(rename = "roundIndex")]
        round_index: u32,
        /// Instance now driving the contest.
        instance: InstanceId,
    },
    /// Terminal or advisory error.
    Error {
        /// Stable machine-readable code, e.g. `DEBATE_CANCELLED`.
        code: String,
        /// Human-readable detail.
        message: String,
    },
}

/// A spectator event bound to its contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectatorFrame {
    /// Contest the event belongs to.
    #[serde(rename = "debateId")]
    pub debate_id: ContestId,
    /// The event.
    #[serde(flatten)]
    pub event: SpectatorEvent,
}

/// Messages published to an instance's private channel
/// (`bot:instance:<instanceId>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstanceMessage {
    /// Forward a turn request to the instance holding the bot.
    BotRequest {
        /// Correlation id; also names the reply channel.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Target bot.
        #[serde(rename = "botId")]
        bot_id: BotId,
        /// The embedded request, forwarded verbatim to the bot.
        request: DebateRequest,
        /// Remaining deadline in milliseconds.
        #[serde(rename = "timeoutMs")]
        timeout_ms: u64,
        /// Requesting instance.
        #[serde(rename = "sourceInstance")]
        source_instance: InstanceId,
    },
    /// Forward a completion notification to the bot's instance.
    DebateComplete {
        /// Target bot.
        #[serde(rename = "botId")]
        bot_id: BotId,
        /// The `debate_complete` envelope to deliver.
        envelope: ServerToBot,
    },
}

/// Messages published on an ephemeral reply channel
/// (`bot:response:<requestId>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseMessage {
    /// The bot replied; content already validated at the forwarding side.
    Response {
        /// Echoed correlation id.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Turn content.
        message: String,
        /// Optional confidence in [0, 1].
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    /// The request could not be satisfied.
    Error {
        /// Echoed correlation id.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Failure detail.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::InstanceId;

    #[test]
    fn test_ping_pong_wire_shape() {
        assert_eq!(
            serde_json::to_string(&ServerToBot::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
        let pong: BotToServer = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(pong, BotToServer::Pong);
    }

    #[test]
    fn test_debate_request_field_names() {
        let req = DebateRequest {
            request_id: RequestId::from_raw("a:b:1:2"),
            debate_id: "d-1".to_string(),
            round: "opening".to_string(),
            round_index: 0,
            topic: "Cats are better than dogs".to_string(),
            position: Side::Pro,
            opponent_last_message: None,
            time_limit_seconds: 60,
            word_limit: WordLimit { min: 50, max: 250 },
            char_limit: CharLimit::from_word_limit(WordLimit { min: 50, max: 250 }),
            messages_so_far: vec![],
        };
        let json = serde_json::to_value(ServerToBot::DebateRequest(req)).unwrap();
        assert_eq!(json["type"], "debate_request");
        assert_eq!(json["requestId"], "a:b:1:2");
        assert_eq!(json["roundIndex"], 0);
        assert_eq!(json["time_limit_seconds"], 60);
        assert_eq!(json["char_limit"]["min"], 200);
        assert_eq!(json["char_limit"]["max"], 1750);
        assert_eq!(json["opponent_last_message"], serde_json::Value::Null);
    }

    #[test]
    fn test_debate_response_parses_without_confidence() {
        let raw = r#"{"type":"debate_response","requestId":"x","message":"hello"}"#;
        let parsed: BotToServer = serde_json::from_str(raw).unwrap();
        match parsed {
            BotToServer::DebateResponse {
                request_id,
                message,
                confidence,
            } => {
                assert_eq!(request_id.as_str(), "x");
                assert_eq!(message, "hello");
                assert!(confidence.is_none());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_queue_join_defaults() {
        let parsed: BotToServer = serde_json::from_str(r#"{"type":"queue_join"}"#).unwrap();
        assert_eq!(
            parsed,
            BotToServer::QueueJoin {
                stake: None,
                preset_id: None
            }
        );
        let parsed: BotToServer =
            serde_json::from_str(r#"{"type":"queue_join","stake":10,"presetId":"classic"}"#)
                .unwrap();
        assert_eq!(
            parsed,
            BotToServer::QueueJoin {
                stake: Some(10),
                preset_id: Some(PresetId::from("classic"))
            }
        );
    }

    #[test]
    fn test_spectator_frame_shape() {
        let frame = SpectatorFrame {
            debate_id: ContestId::new(),
            event: SpectatorEvent::VoteUpdate {
                round_index: 1,
                pro_votes: 2,
                con_votes: 3,
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "vote_update");
        assert_eq!(json["payload"]["proVotes"], 2);
        assert_eq!(json["payload"]["conVotes"], 3);
        assert!(json["debateId"].is_string());

        let back: SpectatorFrame = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_error_event_code() {
        let frame = SpectatorFrame {
            debate_id: ContestId::new(),
            event: SpectatorEvent::Error {
                code: "DEBATE_CANCELLED".to_string(),
                message: "operator request".to_string(),
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["code"], "DEBATE_CANCELLED");
    }

    #[test]
    fn test_instance_message_roundtrip() {
        let msg = InstanceMessage::BotRequest {
            request_id: RequestId::from_raw("r-1"),
            bot_id: BotId::new(),
            request: DebateRequest {
                request_id: RequestId::from_raw("r-1"),
                debate_id: "d".to_string(),
                round: "closing".to_string(),
                round_index: 2,
                topic: "t".to_string(),
                position: Side::Con,
                opponent_last_message: Some("prior".to_string()),
                time_limit_seconds: 30,
                word_limit: WordLimit { min: 10, max: 100 },
                char_limit: CharLimit { min: 40, max: 700 },
                messages_so_far: vec![TranscriptEntry {
                    round: "opening".to_string(),
                    position: Side::Pro,
                    content: "prior".to_string(),
                }],
            },
            timeout_ms: 30_000,
            source_instance: InstanceId::new("inst-b"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: InstanceMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_response_message_variants() {
        let ok = ResponseMessage::Response {
            request_id: RequestId::from_raw("r"),
            message: "m".to_string(),
            confidence: Some(0.5),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["type"], "response");

        let err = ResponseMessage::Error {
            request_id: RequestId::from_raw("r"),
            message: "Bot not connected".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn test_malformed_inbound_is_an_error() {
        assert!(serde_json::from_str::<BotToServer>("{\"type\":\"nope\"}").is_err());
        assert!(serde_json::from_str::<BotToServer>("not json").is_err());
    }
}
