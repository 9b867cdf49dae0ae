// Room state: teams, participants, pool cursor, standing bid, countdown,
// activity log, and the RTM sub-state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Player, FRANCHISES, STARTING_PURSE};

/// Seconds added to the countdown by every accepted bid, capped at the
/// configured duration (anti-sniping extension).
pub const BID_TIMER_EXTENSION: u32 = 5;

/// Fixed window for every RTM stage, regardless of the room's configured
/// timer duration.
pub const RTM_TIMER: u32 = 15;

/// RTM cards a team starts with when it retains nothing.
pub const DEFAULT_RTM_CARDS: u32 = 6;

/// Room lifecycle. `RtmPhase` suspends bidding while the right-to-match
/// negotiation runs; `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Waiting,
    Live,
    RtmPhase,
    Finished,
}

/// Per-room feature flags, fixed at creation. The creating client is
/// responsible for keeping the two mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub allow_retention: bool,
    #[serde(rename = "allowRTM")]
    pub allow_rtm: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        RoomConfig {
            allow_retention: false,
            allow_rtm: true,
        }
    }
}

/// The standing high bid on the current player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub amount: u64,
    /// Display name of the bidding participant.
    pub user: String,
    /// The team the bidder controls.
    pub team: String,
}

/// A player on a team's roster: the catalog record plus sale metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedPlayer {
    #[serde(flatten)]
    pub player: Player,
    pub sold_price: u64,
    pub winner: String,
    #[serde(default)]
    pub is_retained: bool,
    #[serde(default, rename = "isRTM")]
    pub is_rtm: bool,
}

/// One of the ten franchises inside a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    pub purse: i64,
    #[serde(default)]
    pub players: Vec<OwnedPlayer>,
    #[serde(default)]
    pub overseas_count: u32,
    #[serde(default)]
    pub total_spent: i64,
    #[serde(default)]
    pub rtm_cards: u32,
}

impl Team {
    pub fn new(name: &str) -> Self {
        Team {
            name: name.to_string(),
            purse: STARTING_PURSE,
            players: Vec::new(),
            overseas_count: 0,
            total_spent: 0,
            rtm_cards: 0,
        }
    }

    /// The default ten-franchise slate used when the creating client does
    /// not supply its own teams.
    pub fn default_slate() -> HashMap<String, Team> {
        FRANCHISES
            .iter()
            .map(|&code| (code.to_string(), Team::new(code)))
            .collect()
    }
}

/// One user inside one room. Never deleted once created; disconnects only
/// flip `is_online`. Socket handles live in the session layer, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: String,
    pub team: Option<String>,
    pub is_online: bool,
}

/// Entry in the room's activity feed. Newest-first, unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActivityEntry {
    Bid {
        team: String,
        user: String,
        amount: u64,
        timestamp: i64,
    },
    Sold {
        player: OwnedPlayer,
        team: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Chat {
        user: String,
        team: String,
        text: String,
        timestamp: i64,
    },
    System {
        text: String,
    },
}

/// Stage of the right-to-match negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RtmStage {
    Intent,
    Hike,
    FinalMatch,
}

/// Right-to-match sub-state, present only while `status == RTM_PHASE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtmState {
    /// The franchise the player belonged to before the auction.
    pub previous_team: String,
    /// The participant currently controlling `previous_team`.
    pub owner: String,
    /// Frozen copy of the winning bid from the LIVE phase.
    pub current_bid: Bid,
    pub player: Player,
    pub stage: RtmStage,
    /// Set once the negotiation reaches HIKE/FINAL_MATCH.
    #[serde(default)]
    pub new_amount: Option<u64>,
}

/// One independent auction instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: String,
    pub creator: String,
    pub status: RoomStatus,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub config: RoomConfig,
    pub teams: HashMap<String, Team>,
    /// Participants keyed by display name (the join key). The wire and
    /// persistence formats call this `players`.
    #[serde(default, rename = "players")]
    pub participants: HashMap<String, Participant>,
    pub pool: Vec<Player>,
    pub current_player_index: usize,
    pub current_bid: Option<Bid>,
    pub timer: u32,
    pub timer_duration: u32,
    #[serde(default)]
    pub activity: Vec<ActivityEntry>,
    #[serde(default)]
    pub unsold: Vec<Player>,
    #[serde(default)]
    pub rtm_state: Option<RtmState>,
}

impl Room {
    pub fn new(
        code: String,
        creator: String,
        teams: HashMap<String, Team>,
        pool: Vec<Player>,
        timer_duration: u32,
        config: RoomConfig,
    ) -> Self {
        Room {
            code,
            creator,
            status: RoomStatus::Waiting,
            is_paused: false,
            config,
            teams,
            participants: HashMap::new(),
            pool,
            current_player_index: 0,
            current_bid: None,
            timer: timer_duration,
            timer_duration,
            activity: Vec::new(),
            unsold: Vec::new(),
            rtm_state: None,
        }
    }

    /// The player currently up for bid, if the pool is not exhausted.
    pub fn current_player(&self) -> Option<&Player> {
        self.pool.get(self.current_player_index)
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.get(name)
    }

    pub fn team_mut(&mut self, name: &str) -> Option<&mut Team> {
        self.teams.get_mut(name)
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.get(name)
    }

    /// The participant controlling `team`, if any. Online status is
    /// irrelevant here: a disconnected owner still holds the team.
    pub fn team_owner(&self, team: &str) -> Option<&Participant> {
        self.participants
            .values()
            .find(|p| p.team.as_deref() == Some(team))
    }

    /// Prepend an activity entry (the feed is newest-first).
    pub fn push_activity(&mut self, entry: ActivityEntry) {
        self.activity.insert(0, entry);
    }

    pub fn log_system(&mut self, text: impl Into<String>) {
        self.push_activity(ActivityEntry::System { text: text.into() });
    }

    /// One countdown tick. Returns true when the timer reaches zero.
    pub fn tick(&mut self) -> bool {
        self.timer = self.timer.saturating_sub(1);
        self.timer == 0
    }

    /// Anti-sniping extension: every accepted bid adds five seconds,
    /// clamped at the configured duration.
    pub fn extend_timer_for_bid(&mut self) {
        self.timer = (self.timer + BID_TIMER_EXTENSION).min(self.timer_duration);
    }

    /// Move a player onto `team`'s roster at `price`, debiting the purse.
    /// The purse may go negative; affordability is not re-validated here.
    pub fn award(&mut self, team_name: &str, player: &Player, price: u64, is_rtm: bool) {
        let owned = OwnedPlayer {
            player: player.clone(),
            sold_price: price,
            winner: team_name.to_string(),
            is_retained: false,
            is_rtm,
        };
        if let Some(team) = self.teams.get_mut(team_name) {
            team.purse -= price as i64;
            team.total_spent += price as i64;
            if player.is_overseas {
                team.overseas_count += 1;
            }
            team.players.push(owned.clone());
        }
        self.push_activity(ActivityEntry::Sold {
            player: owned,
            team: team_name.to_string(),
            text: None,
        });
    }

    /// Sanitized projection for the wire: everything except participants
    /// (sent separately as the players list) and, by construction, any
    /// handle state (timers live outside the room entirely).
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            creator: self.creator.clone(),
            status: self.status,
            is_paused: self.is_paused,
            config: self.config,
            teams: self.teams.clone(),
            pool: self.pool.clone(),
            current_player_index: self.current_player_index,
            current_bid: self.current_bid.clone(),
            timer: self.timer,
            timer_duration: self.timer_duration,
            activity: self.activity.clone(),
            unsold: self.unsold.clone(),
            rtm_state: self.rtm_state.clone(),
        }
    }

    /// The participant roster as sent alongside snapshots.
    pub fn participant_list(&self) -> Vec<ParticipantInfo> {
        self.participants
            .values()
            .map(|p| ParticipantInfo {
                name: p.name.clone(),
                team: p.team.clone(),
                is_online: p.is_online,
            })
            .collect()
    }
}

/// What clients see of a room. No participant map, no handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub creator: String,
    pub status: RoomStatus,
    pub is_paused: bool,
    pub config: RoomConfig,
    pub teams: HashMap<String, Team>,
    pub pool: Vec<Player>,
    pub current_player_index: usize,
    pub current_bid: Option<Bid>,
    pub timer: u32,
    pub timer_duration: u32,
    pub activity: Vec<ActivityEntry>,
    pub unsold: Vec<Player>,
    pub rtm_state: Option<RtmState>,
}

/// One row of the players list broadcast with every state update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub name: String,
    pub team: Option<String>,
    pub is_online: bool,
}

/// Display formatting for rupee amounts: crores above 1 Cr, lakhs below.
pub fn format_price(p: u64) -> String {
    if p >= 10_000_000 {
        format!("{:.2} Cr", p as f64 / 10_000_000.0)
    } else {
        format!("{:.0} L", p as f64 / 100_000.0)
    }
}
