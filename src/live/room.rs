use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error::{LiveError, Result};
use crate::live::dispatch::{self, Connection};
use crate::live::protocol::ServerMessage;
use crate::live::round::Round;

pub const ROOM_CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ0123456789";
const CODE_ATTEMPTS: usize = 64;

/// One live quiz session, owned by a single host connection.
pub struct Room {
    pub code: String,
    pub(super) state: Mutex<RoomState>,
}

/// Mutable per-room state. Guarded by the room's own lock so structural
/// mutations are mutually exclusive per-room while different rooms proceed
/// independently.
pub(super) struct RoomState {
    pub host: Connection,
    /// Connected players by display name.
    pub players: HashMap<String, Connection>,
    /// Cumulative scores by display name. Entries survive a player's
    /// departure: a name stays reserved and its score stays monotonic for
    /// the lifetime of the room.
    pub scores: HashMap<String, u64>,
    pub current_round: Option<Round>,
    pub next_round_serial: u64,
    pub last_activity: Instant,
    pub closed: bool,
}

impl RoomState {
    fn new(host: Connection) -> Self {
        Self {
            host,
            players: HashMap::new(),
            scores: HashMap::new(),
            current_round: None,
            next_round_serial: 1,
            last_activity: Instant::now(),
            closed: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Same payload to the host and every player.
    pub fn broadcast(&self, message: &ServerMessage) {
        dispatch::fan_out(
            std::iter::once(&self.host).chain(self.players.values()),
            message,
        );
    }

    pub fn broadcast_players(&self, message: &ServerMessage) {
        dispatch::fan_out(self.players.values(), message);
    }
}

/// Process-wide registry of active rooms, constructed once at startup and
/// handed to every connection handler.
pub struct RoomDirectory {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        (0..ROOM_CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Registers a new empty room under a code not currently in use. The
    /// collision check and the insert happen under one write lock, so two
    /// simultaneous creates can never yield the same code.
    pub async fn create(&self, host: Connection) -> Result<Arc<Room>> {
        let mut rooms = self.rooms.write().await;

        for _ in 0..CODE_ATTEMPTS {
            let code = Self::generate_code();
            if rooms.contains_key(&code) {
                continue;
            }

            let room = Arc::new(Room {
                code: code.clone(),
                state: Mutex::new(RoomState::new(host)),
            });
            rooms.insert(code, room.clone());

            tracing::info!(room_code = %room.code, "Room created by host");
            return Ok(room);
        }

        Err(LiveError::CodeSpaceExhausted)
    }

    pub async fn get(&self, code: &str) -> Option<Arc<Room>> {
        let rooms = self.rooms.read().await;
        rooms.get(code).cloned()
    }

    pub async fn remove(&self, code: &str) -> Option<Arc<Room>> {
        let mut rooms = self.rooms.write().await;
        rooms.remove(code)
    }

    pub async fn codes(&self) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms.keys().cloned().collect()
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}
