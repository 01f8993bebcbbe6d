use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::sleep_until;

use crate::config::EngineConfig;
use crate::error::{LiveError, Result};
use crate::live::dispatch::{self, Connection};
use crate::live::protocol::ServerMessage;
use crate::live::room::{RoomDirectory, RoomState};
use crate::live::round::{CloseTrigger, Round};
use crate::live::scoring;

pub const REASON_CLOSED_BY_HOST: &str = "closed by host";
pub const REASON_HOST_DISCONNECTED: &str = "host disconnected";
pub const REASON_IDLE_TIMEOUT: &str = "room idle timeout";

const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Answer to the pre-join lookup endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RoomOverview {
    pub room_code: String,
    pub player_count: usize,
}

/// The live quiz session engine: room directory, membership, round state
/// machine and result fan-out. One instance is built at startup and shared
/// by every connection handler.
pub struct LiveServer {
    directory: RoomDirectory,
    config: EngineConfig,
}

impl LiveServer {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            directory: RoomDirectory::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Host connection opened: registers a room and returns its join code.
    pub async fn create_room(&self, host: Connection) -> Result<String> {
        let room = self.directory.create(host).await?;
        Ok(room.code.clone())
    }

    /// Player admission. Fails without touching room state when the room is
    /// unknown or the display name is taken; on success the host learns the
    /// new player count and every player sees the join.
    pub async fn join_room(&self, code: &str, name: &str, connection: Connection) -> Result<()> {
        let room = self
            .directory
            .get(code)
            .await
            .ok_or_else(|| LiveError::RoomNotFound(code.to_string()))?;
        let mut state = room.state.lock().await;

        if state.closed {
            return Err(LiveError::RoomNotFound(code.to_string()));
        }
        // Names stay reserved for the room's lifetime, so the check is
        // against the score ledger rather than the connected set.
        if state.scores.contains_key(name) {
            return Err(LiveError::NameTaken(name.to_string()));
        }

        state.players.insert(name.to_string(), connection);
        state.scores.insert(name.to_string(), 0);
        state.touch();

        state.broadcast_players(&ServerMessage::PlayerJoined {
            username: name.to_string(),
        });
        state.broadcast(&ServerMessage::PlayerCount {
            count: state.players.len(),
        });

        tracing::info!(room_code = %room.code, player = %name, "Player joined room");
        Ok(())
    }

    /// Player connection closed. The departure never affects an in-flight
    /// round's deadline, but it can leave every remaining player having
    /// answered, which closes the round early.
    pub async fn remove_player(&self, code: &str, name: &str) {
        let Some(room) = self.directory.get(code).await else {
            return;
        };
        let mut state = room.state.lock().await;

        if state.players.remove(name).is_none() {
            return;
        }
        state.touch();

        state.broadcast(&ServerMessage::PlayerCount {
            count: state.players.len(),
        });
        tracing::info!(room_code = %room.code, player = %name, "Player left room");

        self.maybe_close_all_answered(&mut state, &room.code);
    }

    /// `idle -> accepting_answers`. Validates the question, broadcasts it to
    /// every player and schedules the round's single cancellable deadline
    /// timer.
    pub async fn start_round(
        self: &Arc<Self>,
        code: &str,
        question: String,
        options: Vec<String>,
        correct_answer: usize,
        time_limit: u64,
    ) -> Result<()> {
        let room = self
            .directory
            .get(code)
            .await
            .ok_or_else(|| LiveError::RoomNotFound(code.to_string()))?;
        let mut state = room.state.lock().await;

        if state.closed {
            return Err(LiveError::RoomNotFound(code.to_string()));
        }
        if state.current_round.is_some() {
            return Err(LiveError::RoundInProgress);
        }

        let serial = state.next_round_serial;
        let mut round = Round::new(question, options, correct_answer, time_limit, serial)?;
        state.next_round_serial += 1;

        state.broadcast_players(&ServerMessage::Question {
            question: round.question.clone(),
            options: round.options.clone(),
            time_limit,
            question_start_time: unix_millis(),
        });

        let deadline = round.deadline();
        let server = self.clone();
        let room_code = room.code.clone();
        round.timer = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            server.close_round_deadline(&room_code, serial).await;
        }));

        state.current_round = Some(round);
        state.touch();

        tracing::info!(room_code = %room.code, serial, time_limit, "Question broadcast, accepting answers");
        Ok(())
    }

    /// Records a player's answer into the active round. First submission
    /// wins; late, duplicate and unknown-identity submissions are rejected
    /// without touching state.
    pub async fn submit_answer(&self, code: &str, name: &str, option: usize) -> Result<()> {
        let room = self
            .directory
            .get(code)
            .await
            .ok_or_else(|| LiveError::RoomNotFound(code.to_string()))?;
        let mut state = room.state.lock().await;

        if state.closed {
            return Err(LiveError::RoomNotFound(code.to_string()));
        }
        if !state.players.contains_key(name) {
            return Err(LiveError::UnknownPlayer(name.to_string()));
        }

        let answered = {
            let round = state.current_round.as_mut().ok_or(LiveError::NoActiveRound)?;
            round.record_answer(name, option)?;
            round.answer_count()
        };
        state.touch();

        dispatch::send_to(&state.host, &ServerMessage::AnswerCount { answered });
        tracing::debug!(room_code = %room.code, player = %name, answered, "Answer recorded");

        self.maybe_close_all_answered(&mut state, &room.code);
        Ok(())
    }

    /// Tears the room down: cancels any in-flight round without results,
    /// notifies every player with a terminal `room_closed`, then closes all
    /// connections and drops the room from the directory.
    pub async fn close_room(&self, code: &str, reason: &str) -> Result<()> {
        let room = self
            .directory
            .remove(code)
            .await
            .ok_or_else(|| LiveError::RoomNotFound(code.to_string()))?;
        let mut state = room.state.lock().await;
        state.closed = true;

        if let Some(mut round) = state.current_round.take() {
            if let Some(timer) = round.timer.take() {
                timer.abort();
            }
            tracing::info!(room_code = %room.code, serial = round.serial, "Cancelled in-flight round");
        }

        state.broadcast_players(&ServerMessage::RoomClosed {
            reason: reason.to_string(),
        });
        for connection in state.players.values() {
            dispatch::send_close(connection, 1000, reason);
        }
        dispatch::send_close(&state.host, 1000, reason);
        state.players.clear();

        tracing::info!(room_code = %room.code, reason = %reason, "Room closed");
        Ok(())
    }

    /// Host connection dropped: the room dies with it. Already-closed rooms
    /// are fine, the handler calls this unconditionally on the way out.
    pub async fn host_disconnected(&self, code: &str) {
        match self.close_room(code, REASON_HOST_DISCONNECTED).await {
            Ok(()) => {}
            Err(LiveError::RoomNotFound(_)) => {}
            Err(e) => {
                tracing::error!(room_code = %code, error = %e, "Error closing room after host disconnect");
            }
        }
    }

    /// Pre-join lookup used by clients to confirm a room exists before
    /// opening a WebSocket.
    pub async fn room_overview(&self, code: &str) -> Option<RoomOverview> {
        let room = self.directory.get(code).await?;
        let state = room.state.lock().await;
        if state.closed {
            return None;
        }
        Some(RoomOverview {
            room_code: room.code.clone(),
            player_count: state.players.len(),
        })
    }

    /// Optional idle-room expiry. No-op unless `ROOM_IDLE_TIMEOUT_SECS` is
    /// configured; explicit close and host disconnect remain the sanctioned
    /// teardown triggers.
    pub fn start_idle_sweeper(self: Arc<Self>) {
        let Some(idle_timeout) = self.config.room_idle_timeout else {
            return;
        };

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(IDLE_SWEEP_INTERVAL);
            loop {
                interval.tick().await;

                let mut expired = Vec::new();
                for code in self.directory.codes().await {
                    if let Some(room) = self.directory.get(&code).await {
                        let state = room.state.lock().await;
                        if state.last_activity.elapsed() >= idle_timeout {
                            expired.push(code);
                        }
                    }
                }

                for code in expired {
                    tracing::info!(room_code = %code, "Expiring idle room");
                    let _ = self.close_room(&code, REASON_IDLE_TIMEOUT).await;
                }
            }
        });
    }

    /// Deadline timer callback. The serial guard makes a stale timer firing
    /// into a later round a no-op.
    async fn close_round_deadline(&self, code: &str, serial: u64) {
        let Some(room) = self.directory.get(code).await else {
            return;
        };
        let mut state = room.state.lock().await;

        if state.closed {
            return;
        }
        let serial_matches = state
            .current_round
            .as_ref()
            .map(|round| round.serial == serial)
            .unwrap_or(false);
        if !serial_matches {
            tracing::debug!(room_code = %code, serial, "Stale deadline timer, ignoring");
            return;
        }

        self.finish_round(&mut state, code, CloseTrigger::Deadline);
    }

    fn maybe_close_all_answered(&self, state: &mut RoomState, code: &str) {
        let all_answered = match &state.current_round {
            Some(round) => {
                !state.players.is_empty()
                    && state.players.keys().all(|player| round.has_answered(player))
            }
            None => false,
        };

        if all_answered {
            self.finish_round(state, code, CloseTrigger::AllAnswered);
        }
    }

    /// `accepting_answers -> closed`. Taking the round out of the room state
    /// under the lock is what makes the transition fire exactly once when
    /// the deadline and the all-answered check race.
    fn finish_round(&self, state: &mut RoomState, code: &str, trigger: CloseTrigger) {
        let Some(mut round) = state.current_round.take() else {
            return;
        };

        if let Some(timer) = round.timer.take() {
            if trigger != CloseTrigger::Deadline {
                timer.abort();
            }
        }

        let results = scoring::tabulate_round(&self.config.scoring, &round, &mut state.scores);

        // Result messages are enqueued while the lock is still held, so they
        // are ordered before anything the next round broadcasts.
        dispatch::send_to(
            &state.host,
            &ServerMessage::Results {
                top_5: results.top_5,
                correct_answers: results.correct_answers,
                total_answers: results.total_answers,
            },
        );
        state.broadcast_players(&ServerMessage::QuestionEnded {
            correct_answer: results.correct_option,
        });
        state.touch();

        tracing::info!(
            room_code = %code,
            serial = round.serial,
            ?trigger,
            total_answers = results.total_answers,
            correct_answers = results.correct_answers,
            "Round closed, results broadcast"
        );
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
