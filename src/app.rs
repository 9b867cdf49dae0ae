// Application event loop: the single owner of every room, session, and
// ticker in the process.
//
// Network events and timer ticks arrive on two channels and are applied one
// at a time, so room mutations never race. The engine returns `Effects`
// directives; applying them (broadcast, re-arm or cancel the ticker,
// persist) happens here and only here.

use std::collections::HashMap;

use rand::thread_rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::pool::generate_pool;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::engine::{self, Command, Effects, TimerDirective};
use crate::room::registry::Registry;
use crate::room::state::{Participant, Room, RoomConfig, RoomStatus, Team};
use crate::session::Sessions;
use crate::store::Store;
use crate::timer::{Tick, TimerBank};
use crate::ws_server::{ConnId, NetEvent};

/// All mutable server state, owned by the event loop task.
pub struct App {
    registry: Registry,
    sessions: Sessions,
    timers: TimerBank,
    store: Store,
    catalog: Catalog,
    tick_tx: mpsc::Sender<Tick>,
    /// Countdown duration newly created rooms start with.
    default_timer: u32,
}

impl App {
    pub fn new(
        registry: Registry,
        store: Store,
        catalog: Catalog,
        tick_tx: mpsc::Sender<Tick>,
        default_timer: u32,
    ) -> Self {
        App {
            registry,
            sessions: Sessions::new(),
            timers: TimerBank::new(),
            store,
            catalog,
            tick_tx,
            default_timer,
        }
    }

    // -----------------------------------------------------------------------
    // Network events
    // -----------------------------------------------------------------------

    fn handle_net(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connected { conn, addr, sender } => {
                debug!(conn, %addr, "connection registered");
                self.sessions.register(conn, sender);
            }
            NetEvent::Disconnected { conn } => self.handle_disconnect(conn),
            NetEvent::Message { conn, text } => match serde_json::from_str(&text) {
                Ok(msg) => self.handle_client_message(conn, msg),
                Err(e) => {
                    debug!(conn, "unparseable message: {e}");
                    self.sessions.send(
                        conn,
                        &ServerMessage::Error {
                            message: "Invalid message format".to_string(),
                        },
                    );
                }
            },
        }
    }

    /// A connection dropped. The participant record survives; only the
    /// online flag flips, and everyone still in the room hears about it.
    fn handle_disconnect(&mut self, conn: ConnId) {
        let Some((code, user)) = self.sessions.unregister(conn) else {
            return;
        };
        info!(room = %code, %user, "participant disconnected");
        let Some(room) = self.registry.get_mut(&code) else {
            return;
        };
        if let Some(p) = room.participants.get_mut(&user) {
            p.is_online = false;
        }
        let msg = ServerMessage::StateUpdate {
            room: room.snapshot(),
            players_list: room.participant_list(),
        };
        self.sessions.broadcast(room, &msg);
    }

    fn handle_client_message(&mut self, conn: ConnId, msg: ClientMessage) {
        match msg {
            ClientMessage::CreateRoom {
                user_name,
                initial_teams,
                config,
            } => self.create_room(conn, user_name, initial_teams, config),
            ClientMessage::JoinRoom { code, user_name } => self.join_room(conn, code, user_name),
            other => {
                // Everything else is an in-room command; it needs a binding.
                let Some((code, user)) = self.sessions.binding(conn).cloned() else {
                    debug!(conn, "in-room command from unbound connection ignored");
                    return;
                };
                let Some(cmd) = to_command(other) else {
                    return;
                };
                let Some(room) = self.registry.get_mut(&code) else {
                    return;
                };
                let effects = engine::apply(room, &user, cmd);
                self.apply_effects(&code, effects);
            }
        }
    }

    fn create_room(
        &mut self,
        conn: ConnId,
        user_name: String,
        initial_teams: Option<HashMap<String, Team>>,
        config: Option<RoomConfig>,
    ) {
        let mut rng = thread_rng();
        let code = self.registry.generate_code(&mut rng);
        let pool = generate_pool(&self.catalog, &mut rng);
        let teams = initial_teams.unwrap_or_else(Team::default_slate);

        let mut room = Room::new(
            code.clone(),
            user_name.clone(),
            teams,
            pool,
            self.default_timer,
            config.unwrap_or_default(),
        );
        room.participants.insert(
            user_name.clone(),
            Participant {
                name: user_name.clone(),
                team: None,
                is_online: true,
            },
        );
        info!(room = %code, creator = %user_name, "room created");

        self.sessions.bind(conn, &code, &user_name);
        self.sessions.send(
            conn,
            &ServerMessage::RoomCreated {
                code: code.clone(),
                room: room.snapshot(),
            },
        );
        self.registry.insert(room);
        self.store.save_or_log(self.registry.rooms());
    }

    /// Join or rejoin by code. Rejoining under a known name reclaims the
    /// existing participant record, team assignment included.
    fn join_room(&mut self, conn: ConnId, code: String, user_name: String) {
        let Some(room) = self.registry.get_mut(&code) else {
            self.sessions.send(
                conn,
                &ServerMessage::Error {
                    message: "Room not found".to_string(),
                },
            );
            return;
        };

        room.participants
            .entry(user_name.clone())
            .or_insert_with(|| Participant {
                name: user_name.clone(),
                team: None,
                is_online: true,
            })
            .is_online = true;
        info!(room = %code, user = %user_name, "participant joined");

        self.sessions.bind(conn, &code, &user_name);
        self.sessions.send(
            conn,
            &ServerMessage::JoinSuccess {
                room: room.snapshot(),
                players_list: room.participant_list(),
            },
        );
        let msg = ServerMessage::StateUpdate {
            room: room.snapshot(),
            players_list: room.participant_list(),
        };
        self.sessions.broadcast(room, &msg);
        self.store.save_or_log(self.registry.rooms());
    }

    // -----------------------------------------------------------------------
    // Timer ticks
    // -----------------------------------------------------------------------

    fn handle_tick(&mut self, tick: Tick) {
        let code = tick.code;
        let Some(room) = self.registry.get_mut(&code) else {
            // Ticker outlived its room (should not happen; rooms are never
            // deleted), stop it.
            self.timers.cancel(&code);
            return;
        };
        // A tick racing a pause or finish is dropped, not counted.
        if room.is_paused || room.status == RoomStatus::Finished {
            self.timers.cancel(&code);
            return;
        }

        let expired = room.tick();
        let msg = ServerMessage::TimerUpdate { timer: room.timer };
        self.sessions.broadcast(room, &msg);

        if expired {
            // Stop the ticker before resolving; the hammer re-arms it if
            // the auction continues.
            self.timers.cancel(&code);
            let effects = engine::hammer(room);
            self.apply_effects(&code, effects);
        }
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    fn apply_effects(&mut self, code: &str, effects: Effects) {
        {
            let Some(room) = self.registry.get_mut(code) else {
                return;
            };
            if effects.broadcast {
                let msg = ServerMessage::StateUpdate {
                    room: room.snapshot(),
                    players_list: room.participant_list(),
                };
                self.sessions.broadcast(room, &msg);
            }
            match effects.timer {
                TimerDirective::Arm => {
                    // Arming is suppressed while paused or finished; the
                    // countdown value stays frozen in the room for resume.
                    if !room.is_paused && room.status != RoomStatus::Finished {
                        self.timers.arm(code, self.tick_tx.clone());
                    } else {
                        self.timers.cancel(code);
                    }
                }
                TimerDirective::Cancel => self.timers.cancel(code),
                TimerDirective::Leave => {}
            }
        }
        if effects.persist {
            self.store.save_or_log(self.registry.rooms());
        }
    }
}

/// Map an in-room wire message onto an engine command. `None` for the
/// session-level messages handled before reaching the engine.
fn to_command(msg: ClientMessage) -> Option<Command> {
    match msg {
        ClientMessage::StartGame => Some(Command::StartGame),
        ClientMessage::PauseGame => Some(Command::PauseGame),
        ClientMessage::ResumeGame => Some(Command::ResumeGame),
        ClientMessage::EndGame => Some(Command::EndGame),
        ClientMessage::SelectTeam {
            team,
            retentions,
            rtm_count,
            retention_cost,
        } => Some(Command::SelectTeam {
            team,
            retentions,
            rtm_count,
            retention_cost,
        }),
        ClientMessage::PlaceBid { amount } => Some(Command::PlaceBid { amount }),
        ClientMessage::Chat { text } => Some(Command::Chat { text }),
        ClientMessage::UpdateSettings { timer_duration } => {
            Some(Command::UpdateSettings { timer_duration })
        }
        ClientMessage::RtmDecision { decision, amount } => {
            Some(Command::RtmDecision { decision, amount })
        }
        ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } => None,
    }
}

/// Run the event loop until both input channels close.
pub async fn run(
    mut app: App,
    mut net_rx: mpsc::Receiver<NetEvent>,
    mut tick_rx: mpsc::Receiver<Tick>,
) {
    info!("Event loop running");
    loop {
        tokio::select! {
            event = net_rx.recv() => match event {
                Some(event) => app.handle_net(event),
                None => break,
            },
            tick = tick_rx.recv() => match tick {
                Some(tick) => app.handle_tick(tick),
                None => break,
            },
        }
    }
    warn!("Event loop channels closed, shutting down");
    app.timers.cancel_all();
}
