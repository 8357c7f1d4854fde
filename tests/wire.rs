//! Wire-contract conformance
//!
//! External integrators parse these JSON shapes byte-for-byte: bot authors
//! read `debate_request` fields, front-ends switch on spectator `type` tags,
//! and peer instances exchange bus envelopes. Field names asserted here are
//! frozen; renaming one is a breaking protocol change.

use agora::{BotToServer, RequestId, ServerToBot, Side, SpectatorEvent, SpectatorFrame};
use agora_core::{
    CharLimit, ContestId, DebateRequest, InstanceMessage, ResponseMessage, TranscriptEntry,
    WordLimit,
};
use serde_json::json;

fn sample_request() -> DebateRequest {
    DebateRequest {
        request_id: RequestId::from_raw("inst-a:bot:1700000000000:41"),
        debate_id: "f2a9".to_string(),
        round: "rebuttal".to_string(),
        round_index: 1,
        topic: "Cats are better than dogs".to_string(),
        position: Side::Con,
        opponent_last_message: Some("They are not.".to_string()),
        time_limit_seconds: 90,
        word_limit: WordLimit { min: 50, max: 300 },
        char_limit: CharLimit::from_word_limit(WordLimit { min: 50, max: 300 }),
        messages_so_far: vec![TranscriptEntry {
            round: "opening".to_string(),
            position: Side::Pro,
            content: "They are not.".to_string(),
        }],
    }
}

#[test]
fn debate_request_wire_shape() {
    let value = serde_json::to_value(ServerToBot::DebateRequest(sample_request())).unwrap();
    assert_eq!(value["type"], "debate_request");
    assert_eq!(value["requestId"], "inst-a:bot:1700000000000:41");
    assert_eq!(value["debate_id"], "f2a9");
    assert_eq!(value["round"], "rebuttal");
    assert_eq!(value["roundIndex"], 1);
    assert_eq!(value["position"], "con");
    assert_eq!(value["opponent_last_message"], "They are not.");
    assert_eq!(value["time_limit_seconds"], 90);
    assert_eq!(value["word_limit"], json!({"min": 50, "max": 300}));
    assert_eq!(value["char_limit"], json!({"min": 200, "max": 2100}));
    assert_eq!(
        value["messages_so_far"],
        json!([{"round": "opening", "position": "pro", "content": "They are not."}])
    );
}

#[test]
fn connected_and_complete_wire_shapes() {
    let bot_id = agora::BotId::new();
    let value = serde_json::to_value(ServerToBot::Connected {
        bot_id,
        bot_name: "socrates".to_string(),
    })
    .unwrap();
    assert_eq!(value["type"], "connected");
    assert_eq!(value["botId"], bot_id.to_string());
    assert_eq!(value["botName"], "socrates");

    let debate_id = ContestId::new();
    let value = serde_json::to_value(ServerToBot::DebateComplete {
        debate_id,
        won: None,
        elo_change: -16,
    })
    .unwrap();
    assert_eq!(value["type"], "debate_complete");
    assert_eq!(value["debateId"], debate_id.to_string());
    assert_eq!(value["won"], serde_json::Value::Null);
    assert_eq!(value["eloChange"], -16);
}

#[test]
fn bot_to_server_parses_wire_forms() {
    let cases: Vec<(&str, BotToServer)> = vec![
        (r#"{"type":"pong"}"#, BotToServer::Pong),
        (r#"{"type":"queue_leave"}"#, BotToServer::QueueLeave),
        (
            r#"{"type":"queue_join","stake":25,"presetId":"blitz"}"#,
            BotToServer::QueueJoin {
                stake: Some(25),
                preset_id: Some("blitz".into()),
            },
        ),
        (
            r#"{"type":"debate_response","requestId":"r-9","message":"Indeed.","confidence":0.75}"#,
            BotToServer::DebateResponse {
                request_id: RequestId::from_raw("r-9"),
                message: "Indeed.".to_string(),
                confidence: Some(0.75),
            },
        ),
    ];
    for (raw, expected) in cases {
        let parsed: BotToServer = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, expected, "mismatch for {raw}");
    }
}

#[test]
fn spectator_frames_carry_debate_id_type_and_payload() {
    let debate_id = ContestId::new();
    let frame = SpectatorFrame {
        debate_id,
        event: SpectatorEvent::RoundEnded {
            round: "closing".to_string(),
            round_index: 2,
            pro_votes: 4,
            con_votes: 4,
            winner: Side::Pro,
            score: agora_core::MatchScore { pro: 2, con: 1 },
        },
    };
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["debateId"], debate_id.to_string());
    assert_eq!(value["type"], "round_ended");
    assert_eq!(value["payload"]["round"], "closing");
    assert_eq!(value["payload"]["roundIndex"], 2);
    assert_eq!(value["payload"]["proVotes"], 4);
    assert_eq!(value["payload"]["conVotes"], 4);
    // Ties read as a pro win on the wire too
    assert_eq!(value["payload"]["winner"], "pro");
    assert_eq!(value["payload"]["score"], json!({"pro": 2, "con": 1}));
}

#[test]
fn spectator_type_tags_are_snake_case() {
    let debate_id = ContestId::new();
    let tags: Vec<(SpectatorEvent, &str)> = vec![
        (
            SpectatorEvent::VotingStarted {
                round_index: 0,
                time_limit: 30,
            },
            "voting_started",
        ),
        (
            SpectatorEvent::SpectatorCount { count: 7 },
            "spectator_count",
        ),
        (
            SpectatorEvent::Error {
                code: "DEBATE_CANCELLED".to_string(),
                message: "gone".to_string(),
            },
            "error",
        ),
        (
            SpectatorEvent::DebateResumed {
                round_index: 1,
                instance: "inst-b".into(),
            },
            "debate_resumed",
        ),
    ];
    for (event, tag) in tags {
        let value = serde_json::to_value(SpectatorFrame {
            debate_id,
            event,
        })
        .unwrap();
        assert_eq!(value["type"], tag);
    }
}

#[test]
fn bus_envelopes_roundtrip() {
    let message = InstanceMessage::BotRequest {
        request_id: RequestId::from_raw("r-1"),
        bot_id: agora::BotId::new(),
        request: sample_request(),
        timeout_ms: 90_000,
        source_instance: "inst-a".into(),
    };
    let raw = serde_json::to_string(&message).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["type"], "bot_request");
    assert_eq!(value["timeoutMs"], 90_000);
    assert_eq!(value["sourceInstance"], "inst-a");
    let back: InstanceMessage = serde_json::from_str(&raw).unwrap();
    assert_eq!(back, message);

    let reply = ResponseMessage::Error {
        request_id: RequestId::from_raw("r-1"),
        message: "Bot not connected".to_string(),
    };
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["requestId"], "r-1");
}
