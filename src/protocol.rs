// Wire protocol: JSON text frames, `type`-tagged, camelCase fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Player;
use crate::room::state::{ParticipantInfo, RoomConfig, RoomSnapshot, Team};

/// A player submitted for retention, tagged capped/uncapped. Slab prices are
/// applied positionally in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionEntry {
    #[serde(flatten)]
    pub player: Player,
    #[serde(default)]
    pub is_capped: bool,
}

/// A decision inside the RTM negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RtmChoice {
    UseRtm,
    Pass,
    SubmitHike,
    Match,
}

/// Everything a client can send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "CREATE_ROOM", rename_all = "camelCase")]
    CreateRoom {
        user_name: String,
        /// Optional client-supplied team slate; defaults to the ten
        /// catalog franchises when absent.
        #[serde(default)]
        initial_teams: Option<HashMap<String, Team>>,
        #[serde(default)]
        config: Option<RoomConfig>,
    },

    #[serde(rename = "JOIN_ROOM", rename_all = "camelCase")]
    JoinRoom { code: String, user_name: String },

    #[serde(rename = "START_GAME")]
    StartGame,

    #[serde(rename = "PAUSE_GAME")]
    PauseGame,

    #[serde(rename = "RESUME_GAME")]
    ResumeGame,

    #[serde(rename = "END_GAME")]
    EndGame,

    #[serde(rename = "SELECT_TEAM", rename_all = "camelCase")]
    SelectTeam {
        team: String,
        #[serde(default)]
        retentions: Vec<RetentionEntry>,
        #[serde(default)]
        rtm_count: u32,
        #[serde(default)]
        retention_cost: i64,
    },

    #[serde(rename = "PLACE_BID")]
    PlaceBid { amount: u64 },

    #[serde(rename = "CHAT")]
    Chat { text: String },

    #[serde(rename = "UPDATE_SETTINGS", rename_all = "camelCase")]
    UpdateSettings { timer_duration: u32 },

    #[serde(rename = "RTM_DECISION")]
    RtmDecision {
        decision: RtmChoice,
        #[serde(default)]
        amount: Option<u64>,
    },
}

/// Everything the server sends. Snapshots carry no connection or timer
/// handles; the participant roster rides alongside as `playersList`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ROOM_CREATED")]
    RoomCreated { code: String, room: RoomSnapshot },

    #[serde(rename = "JOIN_SUCCESS", rename_all = "camelCase")]
    JoinSuccess {
        room: RoomSnapshot,
        players_list: Vec<ParticipantInfo>,
    },

    #[serde(rename = "STATE_UPDATE", rename_all = "camelCase")]
    StateUpdate {
        room: RoomSnapshot,
        players_list: Vec<ParticipantInfo>,
    },

    /// Lightweight per-second update; full snapshots go out only on
    /// mutating commands.
    #[serde(rename = "TIMER_UPDATE")]
    TimerUpdate { timer: u32 },

    #[serde(rename = "ERROR")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_room() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"CREATE_ROOM","userName":"alice","config":{"allowRetention":false,"allowRTM":true}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::CreateRoom {
                user_name,
                initial_teams,
                config,
            } => {
                assert_eq!(user_name, "alice");
                assert!(initial_teams.is_none());
                assert!(config.unwrap().allow_rtm);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_join_and_bid() {
        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"JOIN_ROOM","code":"XK29QF","userName":"bob"}"#)
                .unwrap();
        assert_eq!(
            join,
            ClientMessage::JoinRoom {
                code: "XK29QF".to_string(),
                user_name: "bob".to_string()
            }
        );

        let bid: ClientMessage =
            serde_json::from_str(r#"{"type":"PLACE_BID","amount":60000000}"#).unwrap();
        assert_eq!(bid, ClientMessage::PlaceBid { amount: 60_000_000 });
    }

    #[test]
    fn parses_bare_admin_commands() {
        for (raw, expected) in [
            (r#"{"type":"START_GAME"}"#, ClientMessage::StartGame),
            (r#"{"type":"PAUSE_GAME"}"#, ClientMessage::PauseGame),
            (r#"{"type":"RESUME_GAME"}"#, ClientMessage::ResumeGame),
            (r#"{"type":"END_GAME"}"#, ClientMessage::EndGame),
        ] {
            let msg: ClientMessage = serde_json::from_str(raw).unwrap();
            assert_eq!(msg, expected);
        }
    }

    #[test]
    fn parses_select_team_with_retentions() {
        let raw = r#"{
            "type": "SELECT_TEAM",
            "team": "CSK",
            "retentions": [
                { "id": 9, "name": "Skipper", "role": "Batter", "basePrice": 20000000,
                  "isOverseas": false, "set": "M1", "previousTeam": "CSK", "isCapped": true }
            ],
            "rtmCount": 5,
            "retentionCost": 180000000
        }"#;
        match serde_json::from_str::<ClientMessage>(raw).unwrap() {
            ClientMessage::SelectTeam {
                team,
                retentions,
                rtm_count,
                retention_cost,
            } => {
                assert_eq!(team, "CSK");
                assert_eq!(retentions.len(), 1);
                assert!(retentions[0].is_capped);
                assert_eq!(retentions[0].player.id, 9);
                assert_eq!(rtm_count, 5);
                assert_eq!(retention_cost, 180_000_000);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_rtm_decisions() {
        let use_rtm: ClientMessage =
            serde_json::from_str(r#"{"type":"RTM_DECISION","decision":"USE_RTM"}"#).unwrap();
        assert_eq!(
            use_rtm,
            ClientMessage::RtmDecision {
                decision: RtmChoice::UseRtm,
                amount: None
            }
        );

        let hike: ClientMessage = serde_json::from_str(
            r#"{"type":"RTM_DECISION","decision":"SUBMIT_HIKE","amount":80000000}"#,
        )
        .unwrap();
        assert_eq!(
            hike,
            ClientMessage::RtmDecision {
                decision: RtmChoice::SubmitHike,
                amount: Some(80_000_000)
            }
        );
    }

    #[test]
    fn select_team_defaults_optional_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"SELECT_TEAM","team":"MI"}"#).unwrap();
        match msg {
            ClientMessage::SelectTeam {
                retentions,
                rtm_count,
                retention_cost,
                ..
            } => {
                assert!(retentions.is_empty());
                assert_eq!(rtm_count, 0);
                assert_eq!(retention_cost, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"TELEPORT"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json at all").is_err());
    }

    #[test]
    fn timer_update_serializes_flat() {
        let json = serde_json::to_string(&ServerMessage::TimerUpdate { timer: 9 }).unwrap();
        assert_eq!(json, r#"{"type":"TIMER_UPDATE","timer":9}"#);
    }

    #[test]
    fn error_message_shape() {
        let json = serde_json::to_value(ServerMessage::Error {
            message: "Room not found".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["message"], "Room not found");
    }
}
