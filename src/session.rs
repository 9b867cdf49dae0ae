// Session layer: maps live connections to (room, user) pairs and carries
// broadcasts out to room participants.
//
// Participants and their team assignments live in the Room and are never
// deleted; this layer only tracks which connection, if any, currently
// speaks for a participant. Reconnecting under the same name simply rebinds
// the (room, user) pair to the new connection.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::ServerMessage;
use crate::room::state::Room;
use crate::ws_server::ConnId;

struct Connection {
    sender: mpsc::Sender<String>,
    binding: Option<(String, String)>,
}

/// Connection bookkeeping for the whole process.
#[derive(Default)]
pub struct Sessions {
    conns: HashMap<ConnId, Connection>,
    /// (room code, user name) -> the connection currently speaking for it.
    bindings: HashMap<(String, String), ConnId>,
}

impl Sessions {
    pub fn new() -> Self {
        Sessions::default()
    }

    /// A connection completed its handshake.
    pub fn register(&mut self, conn: ConnId, sender: mpsc::Sender<String>) {
        self.conns.insert(
            conn,
            Connection {
                sender,
                binding: None,
            },
        );
    }

    /// A connection closed. Returns the (room, user) it was speaking for,
    /// if it was still the active connection for that pair; a stale socket
    /// superseded by a reconnect returns `None`.
    pub fn unregister(&mut self, conn: ConnId) -> Option<(String, String)> {
        let connection = self.conns.remove(&conn)?;
        let binding = connection.binding?;
        if self.bindings.get(&binding) == Some(&conn) {
            self.bindings.remove(&binding);
            return Some(binding);
        }
        None
    }

    /// Bind a connection to a (room, user) pair. Any previous connection
    /// for the same pair is superseded.
    pub fn bind(&mut self, conn: ConnId, room_code: &str, user: &str) {
        let key = (room_code.to_string(), user.to_string());
        if let Some(connection) = self.conns.get_mut(&conn) {
            connection.binding = Some(key.clone());
            self.bindings.insert(key, conn);
        }
    }

    /// The (room, user) pair a connection speaks for.
    pub fn binding(&self, conn: ConnId) -> Option<&(String, String)> {
        self.conns.get(&conn).and_then(|c| c.binding.as_ref())
    }

    /// Send one message to one connection. Returns false when the client
    /// is gone or hopelessly backed up.
    pub fn send(&self, conn: ConnId, msg: &ServerMessage) -> bool {
        let Some(connection) = self.conns.get(&conn) else {
            return false;
        };
        let text = match serde_json::to_string(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize outbound message: {e}");
                return false;
            }
        };
        connection.sender.try_send(text).is_ok()
    }

    /// Deliver `msg` to every online participant of `room`. A failed send
    /// marks only that participant offline; the broadcast continues and the
    /// state change that triggered it stands regardless of delivery.
    pub fn broadcast(&self, room: &mut Room, msg: &ServerMessage) {
        let text = match serde_json::to_string(msg) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize broadcast: {e}");
                return;
            }
        };

        let code = room.code.clone();
        for participant in room.participants.values_mut() {
            if !participant.is_online {
                continue;
            }
            let key = (code.clone(), participant.name.clone());
            let delivered = self
                .bindings
                .get(&key)
                .and_then(|conn| self.conns.get(conn))
                .is_some_and(|c| c.sender.try_send(text.clone()).is_ok());
            if !delivered {
                debug!(room = %code, user = %participant.name, "send failed, marking offline");
                participant.is_online = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::state::{Participant, RoomConfig, Team};

    fn test_room() -> Room {
        let mut room = Room::new(
            "ROOM01".to_string(),
            "host".to_string(),
            Team::default_slate(),
            vec![],
            15,
            RoomConfig::default(),
        );
        for name in ["host", "bob"] {
            room.participants.insert(
                name.to_string(),
                Participant {
                    name: name.to_string(),
                    team: None,
                    is_online: true,
                },
            );
        }
        room
    }

    fn timer_update() -> ServerMessage {
        ServerMessage::TimerUpdate { timer: 5 }
    }

    #[tokio::test]
    async fn broadcast_reaches_all_bound_online_participants() {
        let mut sessions = Sessions::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        sessions.register(1, tx_a);
        sessions.register(2, tx_b);
        sessions.bind(1, "ROOM01", "host");
        sessions.bind(2, "ROOM01", "bob");

        let mut room = test_room();
        sessions.broadcast(&mut room, &timer_update());

        assert_eq!(rx_a.try_recv().unwrap(), r#"{"type":"TIMER_UPDATE","timer":5}"#);
        assert!(rx_b.try_recv().is_ok());
        assert!(room.participants.values().all(|p| p.is_online));
    }

    #[tokio::test]
    async fn failed_delivery_marks_only_that_participant_offline() {
        let mut sessions = Sessions::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(8);
        drop(rx_b); // bob's socket writer is gone
        sessions.register(1, tx_a);
        sessions.register(2, tx_b);
        sessions.bind(1, "ROOM01", "host");
        sessions.bind(2, "ROOM01", "bob");

        let mut room = test_room();
        sessions.broadcast(&mut room, &timer_update());

        assert!(rx_a.try_recv().is_ok());
        assert!(room.participant("host").unwrap().is_online);
        assert!(!room.participant("bob").unwrap().is_online);
    }

    #[tokio::test]
    async fn offline_participants_are_skipped() {
        let mut sessions = Sessions::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        sessions.register(1, tx_a);
        sessions.bind(1, "ROOM01", "host");

        let mut room = test_room();
        room.participants.get_mut("bob").unwrap().is_online = false;
        sessions.broadcast(&mut room, &timer_update());

        assert!(rx_a.try_recv().is_ok());
        // bob stays offline, and being unreachable caused no churn.
        assert!(!room.participant("bob").unwrap().is_online);
    }

    #[tokio::test]
    async fn reconnect_supersedes_the_old_connection() {
        let mut sessions = Sessions::new();
        let (tx_old, _rx_old) = mpsc::channel(8);
        let (tx_new, mut rx_new) = mpsc::channel(8);
        sessions.register(1, tx_old);
        sessions.bind(1, "ROOM01", "host");
        sessions.register(2, tx_new);
        sessions.bind(2, "ROOM01", "host");

        // The stale socket closing must not unbind the fresh one.
        assert_eq!(sessions.unregister(1), None);
        assert_eq!(
            sessions.binding(2),
            Some(&("ROOM01".to_string(), "host".to_string()))
        );

        let mut room = test_room();
        room.participants.get_mut("bob").unwrap().is_online = false;
        sessions.broadcast(&mut room, &timer_update());
        assert!(rx_new.try_recv().is_ok());
        assert!(room.participant("host").unwrap().is_online);
    }

    #[tokio::test]
    async fn unregister_returns_binding_for_active_connection() {
        let mut sessions = Sessions::new();
        let (tx, _rx) = mpsc::channel(8);
        sessions.register(1, tx);
        sessions.bind(1, "ROOM01", "host");

        assert_eq!(
            sessions.unregister(1),
            Some(("ROOM01".to_string(), "host".to_string()))
        );
        // Idempotent on repeat.
        assert_eq!(sessions.unregister(1), None);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_is_false() {
        let sessions = Sessions::new();
        assert!(!sessions.send(99, &timer_update()));
    }
}
