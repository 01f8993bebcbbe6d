use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{LiveError, Result};

/// What closed a round. The deadline timer and the all-answered check race;
/// whichever takes the round out of the room state first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    Deadline,
    AllAnswered,
}

/// A recorded answer. At most one per player per round; the first
/// submission wins.
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    pub option: usize,
    pub elapsed: Duration,
}

/// One broadcast question, from send to results. Exists only while the room
/// is accepting answers; taking it out of the room state is the
/// `accepting_answers -> closed` transition.
pub struct Round {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub time_limit: Duration,
    pub started_at: Instant,
    /// Monotonic per-room counter. A stale deadline timer carries the serial
    /// it was scheduled for and is ignored if the room has moved on.
    pub serial: u64,
    answers: HashMap<String, RecordedAnswer>,
    pub(super) timer: Option<JoinHandle<()>>,
}

impl Round {
    /// Validates and opens a round. The question must be non-empty, at least
    /// two non-empty options are required, the correct index must be in
    /// bounds, and the time limit must be positive.
    pub fn new(
        question: String,
        options: Vec<String>,
        correct_option: usize,
        time_limit_seconds: u64,
        serial: u64,
    ) -> Result<Self> {
        if question.trim().is_empty() {
            return Err(LiveError::EmptyQuestion);
        }
        if options.iter().filter(|o| !o.trim().is_empty()).count() < 2 {
            return Err(LiveError::NotEnoughOptions);
        }
        if correct_option >= options.len() {
            return Err(LiveError::CorrectAnswerOutOfBounds {
                index: correct_option,
                options: options.len(),
            });
        }
        if time_limit_seconds == 0 {
            return Err(LiveError::InvalidTimeLimit);
        }

        Ok(Self {
            question,
            options,
            correct_option,
            time_limit: Duration::from_secs(time_limit_seconds),
            started_at: Instant::now(),
            serial,
            answers: HashMap::new(),
            timer: None,
        })
    }

    pub fn deadline(&self) -> Instant {
        self.started_at + self.time_limit
    }

    pub fn is_expired(&self) -> bool {
        self.started_at.elapsed() >= self.time_limit
    }

    /// Records an answer for `player`. Rejects submissions after the
    /// deadline and second submissions from the same player; neither
    /// mutates state.
    pub fn record_answer(&mut self, player: &str, option: usize) -> Result<&RecordedAnswer> {
        let elapsed = self.started_at.elapsed();
        if elapsed >= self.time_limit {
            return Err(LiveError::AnswerWindowClosed);
        }
        if self.answers.contains_key(player) {
            return Err(LiveError::DuplicateAnswer(player.to_string()));
        }

        Ok(self
            .answers
            .entry(player.to_string())
            .or_insert(RecordedAnswer { option, elapsed }))
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    pub fn has_answered(&self, player: &str) -> bool {
        self.answers.contains_key(player)
    }

    pub fn answers(&self) -> &HashMap<String, RecordedAnswer> {
        &self.answers
    }
}
