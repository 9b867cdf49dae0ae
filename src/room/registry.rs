// Room registry: the process-wide room table with a defined lifecycle
// (load at start, mutate on command, persist on change).

use std::collections::HashMap;

use rand::Rng;

use crate::room::state::Room;

/// Alphabet for room codes: uppercase alphanumerics, as generated at
/// room creation.
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

/// Owns every room in the process. Rooms are never deleted; a finished
/// room stays addressable so participants can revisit it.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<String, Room>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Rebuild the registry from persisted rooms. Every participant is
    /// forced offline: connections do not survive a restart, room data does.
    pub fn from_persisted(mut rooms: HashMap<String, Room>) -> Self {
        for room in rooms.values_mut() {
            for participant in room.participants.values_mut() {
                participant.is_online = false;
            }
        }
        Registry { rooms }
    }

    /// Generate a code not currently in use.
    pub fn generate_code<R: Rng>(&self, rng: &mut R) -> String {
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn insert(&mut self, room: Room) {
        self.rooms.insert(room.code.clone(), room);
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// The full table, for persistence.
    pub fn rooms(&self) -> &HashMap<String, Room> {
        &self.rooms
    }
}
