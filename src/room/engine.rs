// Auction engine: the room state machine.
//
// Pure, synchronous mutation of a `Room` driven by participant commands and
// the hammer event. The engine performs no IO; it returns `Effects`
// directives (broadcast / re-arm or cancel the timer / persist) that the
// event loop applies. That keeps every transition unit-testable without
// sockets or clocks.
//
// Rejection policy: commands that are malformed-in-context (wrong state,
// wrong sender, stale bid) are silently dropped with no state change. This
// is deliberate duplicate/race suppression, not an error path.

use chrono::Utc;
use tracing::debug;

use crate::protocol::{RetentionEntry, RtmChoice};
use crate::room::state::{
    ActivityEntry, Bid, OwnedPlayer, Room, RoomStatus, RtmStage, RtmState, format_price,
    DEFAULT_RTM_CARDS, RTM_TIMER,
};

/// Retention price slabs (IPL rules), applied positionally in submission
/// order: 18 Cr, 14 Cr, 11 Cr, 18 Cr for capped, 4 Cr each for uncapped.
const CAPPED_SLABS: [u64; 4] = [180_000_000, 140_000_000, 110_000_000, 180_000_000];
const UNCAPPED_SLABS: [u64; 2] = [40_000_000, 40_000_000];

/// The permitted countdown durations.
const TIMER_CHOICES: [u32; 3] = [10, 15, 20];

/// In-room commands, already bound to a (room, user) pair by the session
/// layer. Room creation and joining are session concerns, not engine ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartGame,
    PauseGame,
    ResumeGame,
    EndGame,
    SelectTeam {
        team: String,
        retentions: Vec<RetentionEntry>,
        rtm_count: u32,
        retention_cost: i64,
    },
    PlaceBid {
        amount: u64,
    },
    Chat {
        text: String,
    },
    UpdateSettings {
        timer_duration: u32,
    },
    RtmDecision {
        decision: RtmChoice,
        amount: Option<u64>,
    },
}

/// What the event loop should do with the room's single timer slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerDirective {
    /// Leave the timer exactly as it is.
    #[default]
    Leave,
    /// Cancel any running ticker and start a fresh one.
    Arm,
    /// Cancel any running ticker.
    Cancel,
}

/// Directives returned by every engine entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    pub broadcast: bool,
    pub timer: TimerDirective,
    pub persist: bool,
}

impl Effects {
    fn none() -> Self {
        Effects::default()
    }

    fn update(timer: TimerDirective) -> Self {
        Effects {
            broadcast: true,
            timer,
            persist: true,
        }
    }
}

/// Apply one command from `user` against the room. Finished rooms reject
/// everything.
pub fn apply(room: &mut Room, user: &str, cmd: Command) -> Effects {
    if room.status == RoomStatus::Finished {
        return Effects::none();
    }

    match cmd {
        Command::StartGame => start_game(room, user),
        Command::PauseGame => pause_game(room, user),
        Command::ResumeGame => resume_game(room, user),
        Command::EndGame => end_game(room, user),
        Command::SelectTeam {
            team,
            retentions,
            rtm_count,
            retention_cost,
        } => select_team(room, user, &team, retentions, rtm_count, retention_cost),
        Command::PlaceBid { amount } => place_bid(room, user, amount),
        Command::Chat { text } => chat(room, user, text),
        Command::UpdateSettings { timer_duration } => update_settings(room, timer_duration),
        Command::RtmDecision { decision, amount } => rtm_decision(room, user, decision, amount),
    }
}

// ---------------------------------------------------------------------------
// Admin controls
// ---------------------------------------------------------------------------

fn is_admin(room: &Room, user: &str) -> bool {
    room.creator == user
}

fn start_game(room: &mut Room, user: &str) -> Effects {
    if !is_admin(room, user) {
        return Effects::none();
    }
    room.status = RoomStatus::Live;
    room.is_paused = false;
    room.log_system("AUCTION STARTED!");
    Effects::update(TimerDirective::Arm)
}

fn pause_game(room: &mut Room, user: &str) -> Effects {
    if !is_admin(room, user) {
        return Effects::none();
    }
    room.is_paused = true;
    room.log_system("AUCTION PAUSED BY ADMIN");
    // Cancel without resetting `timer`; resume restarts from the frozen value.
    Effects::update(TimerDirective::Cancel)
}

fn resume_game(room: &mut Room, user: &str) -> Effects {
    if !is_admin(room, user) {
        return Effects::none();
    }
    room.is_paused = false;
    room.log_system("AUCTION RESUMED");
    Effects::update(TimerDirective::Arm)
}

fn end_game(room: &mut Room, user: &str) -> Effects {
    if !is_admin(room, user) {
        return Effects::none();
    }
    room.status = RoomStatus::Finished;
    room.is_paused = false;
    room.log_system("AUCTION CONCLUDED BY ADMIN");
    Effects::update(TimerDirective::Cancel)
}

// ---------------------------------------------------------------------------
// Team selection and retention
// ---------------------------------------------------------------------------

fn select_team(
    room: &mut Room,
    user: &str,
    team_name: &str,
    retentions: Vec<RetentionEntry>,
    rtm_count: u32,
    retention_cost: i64,
) -> Effects {
    if !room.participants.contains_key(user) || !room.teams.contains_key(team_name) {
        return Effects::none();
    }

    if let Some(p) = room.participants.get_mut(user) {
        p.team = Some(team_name.to_string());
    }

    if !retentions.is_empty() {
        // Slab prices are positional within each bucket, in submission order.
        // The aggregate purse debit uses the client-computed retentionCost;
        // slab prices only annotate the individual roster entries.
        let capped = retentions.iter().filter(|r| r.is_capped);
        let uncapped = retentions.iter().filter(|r| !r.is_capped);

        for (idx, entry) in capped.enumerate() {
            retain_player(room, team_name, entry, CAPPED_SLABS.get(idx).copied());
        }
        for (idx, entry) in uncapped.enumerate() {
            retain_player(room, team_name, entry, UNCAPPED_SLABS.get(idx).copied());
        }

        if let Some(team) = room.team_mut(team_name) {
            team.purse -= retention_cost;
            team.total_spent += retention_cost;
            team.rtm_cards = rtm_count;
        }
    } else if let Some(team) = room.team_mut(team_name) {
        // Only seed the default card count on a fresh roster, so repeated
        // SELECT_TEAM calls don't reset spent cards.
        if team.players.is_empty() {
            team.rtm_cards = DEFAULT_RTM_CARDS;
        }
    }

    Effects::update(TimerDirective::Leave)
}

fn retain_player(room: &mut Room, team_name: &str, entry: &RetentionEntry, slab: Option<u64>) {
    let already_on_roster = room
        .team(team_name)
        .is_some_and(|t| t.players.iter().any(|p| p.player.id == entry.player.id));
    if already_on_roster {
        return;
    }

    if let Some(team) = room.team_mut(team_name) {
        team.players.push(OwnedPlayer {
            player: entry.player.clone(),
            sold_price: slab.unwrap_or(0),
            winner: team_name.to_string(),
            is_retained: true,
            is_rtm: false,
        });
        if entry.player.is_overseas {
            team.overseas_count += 1;
        }
    }

    // A retained player is never auctioned.
    room.pool.retain(|p| p.id != entry.player.id);
}

// ---------------------------------------------------------------------------
// Bidding
// ---------------------------------------------------------------------------

fn place_bid(room: &mut Room, user: &str, amount: u64) -> Effects {
    if room.status != RoomStatus::Live {
        return Effects::none();
    }
    // Stale or duplicate bids below the standing amount are dropped, not
    // errored: near-simultaneous bids race and the losers must disappear.
    if let Some(bid) = &room.current_bid {
        if amount <= bid.amount {
            debug!(room = %room.code, user, amount, "stale bid ignored");
            return Effects::none();
        }
    }
    // A bid without a selected team could never resolve into a sale.
    let Some(team) = room
        .participant(user)
        .and_then(|p| p.team.clone())
    else {
        return Effects::none();
    };

    room.current_bid = Some(Bid {
        amount,
        user: user.to_string(),
        team: team.clone(),
    });
    room.extend_timer_for_bid();
    room.push_activity(ActivityEntry::Bid {
        team,
        user: user.to_string(),
        amount,
        timestamp: Utc::now().timestamp_millis(),
    });

    Effects::update(TimerDirective::Arm)
}

// ---------------------------------------------------------------------------
// Chat and settings
// ---------------------------------------------------------------------------

fn chat(room: &mut Room, user: &str, text: String) -> Effects {
    let Some(participant) = room.participant(user) else {
        return Effects::none();
    };
    let team = participant.team.clone().unwrap_or_else(|| "Fan".to_string());
    room.push_activity(ActivityEntry::Chat {
        user: user.to_string(),
        team,
        text,
        timestamp: Utc::now().timestamp_millis(),
    });
    Effects {
        broadcast: true,
        timer: TimerDirective::Leave,
        persist: false,
    }
}

/// Not admin-gated: any joined user may change the duration. The change
/// applies from the next timer reset, never the running countdown.
fn update_settings(room: &mut Room, timer_duration: u32) -> Effects {
    if !TIMER_CHOICES.contains(&timer_duration) {
        return Effects::none();
    }
    room.timer_duration = timer_duration;
    Effects::update(TimerDirective::Leave)
}

// ---------------------------------------------------------------------------
// Hammer: timer expiry
// ---------------------------------------------------------------------------

/// The countdown reached zero. Resolve the current RTM stage by forfeit, or
/// the current player's sale.
pub fn hammer(room: &mut Room) -> Effects {
    if room.status == RoomStatus::RtmPhase {
        let Some(rtm) = room.rtm_state.clone() else {
            // Inconsistent; drop back to LIVE and resolve normally.
            room.status = RoomStatus::Live;
            return resolve_current(room, false);
        };
        match rtm.stage {
            RtmStage::Intent => {
                // Previous team passed by default. The sale resolves to the
                // original winner; eligibility is not re-evaluated.
                room.log_system(format!("RTM Expired! {} passed.", rtm.previous_team));
                room.status = RoomStatus::Live;
                room.rtm_state = None;
                return resolve_current(room, true);
            }
            RtmStage::Hike => {
                // Winner declined to hike: final match at the original price.
                if let Some(state) = room.rtm_state.as_mut() {
                    state.new_amount = Some(rtm.current_bid.amount);
                    state.stage = RtmStage::FinalMatch;
                }
                room.timer = RTM_TIMER;
                room.log_system(format!(
                    "Hike Expired! {} can match at original price.",
                    rtm.previous_team
                ));
                return Effects::update(TimerDirective::Arm);
            }
            RtmStage::FinalMatch => {
                // Previous team passed by default; no card spent.
                let amount = rtm.new_amount.unwrap_or(rtm.current_bid.amount);
                let winner = rtm.current_bid.team.clone();
                room.award(&winner, &rtm.player, amount, false);
                annotate_last_sale(room, format!("RTM Expired! Sold to {winner}."));
                return finish_rtm(room);
            }
        }
    }

    resolve_current(room, false)
}

/// Resolve the player under the hammer: either open the RTM window or
/// complete the sold/unsold outcome and advance the pool cursor.
///
/// `skip_rtm_check` is set when arriving from an INTENT-stage forfeit, which
/// already consumed this player's one RTM opportunity.
fn resolve_current(room: &mut Room, skip_rtm_check: bool) -> Effects {
    let Some(player) = room.current_player().cloned() else {
        return Effects::none();
    };

    if !skip_rtm_check {
        if let Some(effects) = try_enter_rtm(room, &player) {
            return effects;
        }
    }

    match room.current_bid.clone() {
        Some(bid) => {
            room.award(&bid.team, &player, bid.amount, false);
        }
        None => {
            room.unsold.push(player.clone());
            room.log_system(format!("{} is UNSOLD!", player.name));
        }
    }

    advance(room)
}

/// RTM eligibility: all five conditions must hold.
fn try_enter_rtm(room: &mut Room, player: &crate::catalog::Player) -> Option<Effects> {
    // (a) a winning bid exists
    let bid = room.current_bid.clone()?;
    // (b) the player has a previous team that exists in this room
    let prev_team_name = player.previous_team.clone()?;
    let prev_team = room.team(&prev_team_name)?;
    // (d) that team has cards left
    if prev_team.rtm_cards == 0 {
        return None;
    }
    // (e) it is not also the winning team
    if bid.team == prev_team_name {
        return None;
    }
    // (c) some participant controls the previous team (online or not)
    let owner = room.team_owner(&prev_team_name)?.name.clone();

    room.status = RoomStatus::RtmPhase;
    room.rtm_state = Some(RtmState {
        previous_team: prev_team_name.clone(),
        owner,
        current_bid: bid.clone(),
        player: player.clone(),
        stage: RtmStage::Intent,
        new_amount: None,
    });
    room.timer = RTM_TIMER;
    room.log_system(format!(
        "RTM CHOICE: {} can match {}'s bid for {}!",
        prev_team_name, bid.team, player.name
    ));

    Some(Effects::update(TimerDirective::Arm))
}

/// Clear the bid, advance the cursor, reset the countdown, and either
/// continue to the next player or conclude the auction.
fn advance(room: &mut Room) -> Effects {
    room.current_bid = None;
    room.current_player_index += 1;
    room.timer = room.timer_duration;

    if room.current_player_index < room.pool.len() {
        // The auction self-advances; no admin action needed.
        Effects::update(TimerDirective::Arm)
    } else {
        room.log_system("ALL PLAYERS SOLD! GAME OVER.");
        room.status = RoomStatus::Finished;
        Effects::update(TimerDirective::Cancel)
    }
}

// ---------------------------------------------------------------------------
// RTM decisions
// ---------------------------------------------------------------------------

fn rtm_decision(
    room: &mut Room,
    user: &str,
    decision: RtmChoice,
    amount: Option<u64>,
) -> Effects {
    if room.status != RoomStatus::RtmPhase {
        return Effects::none();
    }
    let Some(rtm) = room.rtm_state.clone() else {
        return Effects::none();
    };

    match (rtm.stage, decision) {
        // Stage 1: previous team declares intent.
        (RtmStage::Intent, RtmChoice::UseRtm) if rtm.owner == user => {
            if let Some(state) = room.rtm_state.as_mut() {
                state.stage = RtmStage::Hike;
            }
            room.timer = RTM_TIMER;
            room.log_system(format!(
                "{} wants to use RTM! {} can now hike the bid.",
                rtm.previous_team, rtm.current_bid.team
            ));
            Effects::update(TimerDirective::Arm)
        }
        (RtmStage::Intent, RtmChoice::Pass) if rtm.owner == user => {
            // Sold to the original winner at the original price; no card spent.
            room.status = RoomStatus::Live;
            room.award(&rtm.current_bid.team, &rtm.player, rtm.current_bid.amount, false);
            finish_rtm(room)
        }

        // Stage 2: the winning bidder may hike.
        (RtmStage::Hike, RtmChoice::SubmitHike) if rtm.current_bid.user == user => {
            let new_amount = amount.unwrap_or(rtm.current_bid.amount);
            if let Some(state) = room.rtm_state.as_mut() {
                state.new_amount = Some(new_amount);
                state.stage = RtmStage::FinalMatch;
            }
            room.timer = RTM_TIMER;
            room.log_system(format!(
                "{} hiked bid to {}! {}, will you match?",
                rtm.current_bid.team,
                format_price(new_amount),
                rtm.previous_team
            ));
            Effects::update(TimerDirective::Arm)
        }

        // Stage 3: previous team matches or passes at the (possibly hiked)
        // price. The card is spent only on an actual match.
        (RtmStage::FinalMatch, RtmChoice::Match) if rtm.owner == user => {
            let amount = rtm.new_amount.unwrap_or(rtm.current_bid.amount);
            room.award(&rtm.previous_team, &rtm.player, amount, true);
            if let Some(team) = room.team_mut(&rtm.previous_team) {
                team.rtm_cards = team.rtm_cards.saturating_sub(1);
            }
            annotate_last_sale(room, format!("{} matched the hike!", rtm.previous_team));
            finish_rtm(room)
        }
        (RtmStage::FinalMatch, RtmChoice::Pass) if rtm.owner == user => {
            let amount = rtm.new_amount.unwrap_or(rtm.current_bid.amount);
            let winner = rtm.current_bid.team.clone();
            room.award(&winner, &rtm.player, amount, false);
            annotate_last_sale(
                room,
                format!(
                    "{} passed. Sold to {} at hiked price.",
                    rtm.previous_team, winner
                ),
            );
            finish_rtm(room)
        }

        // Wrong stage, wrong actor, or wrong verb: ignore.
        _ => Effects::none(),
    }
}

/// Shared RTM teardown: back to LIVE, clear the sub-state, advance the pool.
fn finish_rtm(room: &mut Room) -> Effects {
    room.status = RoomStatus::Live;
    room.rtm_state = None;
    advance(room)
}

/// Attach commentary to the sale entry just logged by `Room::award`.
fn annotate_last_sale(room: &mut Room, commentary: String) {
    if let Some(ActivityEntry::Sold { text, .. }) = room.activity.first_mut() {
        *text = Some(commentary);
    }
}
