use thiserror::Error;

/// Custom error types for the live quiz server
#[derive(Debug, Error)]
pub enum LiveError {
    /// Admission errors - the connection is refused before touching room state
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Name {0} is already taken in this room")]
    NameTaken(String),

    #[error("Could not allocate a unique room code")]
    CodeSpaceExhausted,

    /// Round state errors - replied as `error`, no state mutated
    #[error("A question is already in progress")]
    RoundInProgress,

    #[error("No question is currently accepting answers")]
    NoActiveRound,

    #[error("The answer window for this question has closed")]
    AnswerWindowClosed,

    #[error("Player {0} has already answered this question")]
    DuplicateAnswer(String),

    #[error("Player {0} is not part of this room")]
    UnknownPlayer(String),

    /// Question validation errors
    #[error("Question text must not be empty")]
    EmptyQuestion,

    #[error("A question needs at least two non-empty options")]
    NotEnoughOptions,

    #[error("Correct answer index {index} is out of bounds for {options} options")]
    CorrectAnswerOutOfBounds { index: usize, options: usize },

    #[error("Time limit must be a positive number of seconds")]
    InvalidTimeLimit,

    /// Protocol errors - replied as `error`, connection stays open
    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    #[error("Unexpected message type {0} for this role")]
    UnexpectedMessage(String),
}

/// Convenience type alias for Results using LiveError
pub type Result<T> = std::result::Result<T, LiveError>;

impl LiveError {
    /// WebSocket close code used when a connection is refused at admission.
    /// Application close codes live in the 4000-4999 range.
    pub fn close_code(&self) -> u16 {
        match self {
            LiveError::RoomNotFound(_) => 4004,
            LiveError::NameTaken(_) => 4009,
            _ => 4000,
        }
    }

    /// True for errors resolved by refusing the connection rather than
    /// replying with an `error` message.
    pub fn is_admission_error(&self) -> bool {
        matches!(self, LiveError::RoomNotFound(_) | LiveError::NameTaken(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LiveError::RoomNotFound("ABCD1234".to_string());
        assert_eq!(err.to_string(), "Room ABCD1234 not found");

        let err = LiveError::CorrectAnswerOutOfBounds { index: 4, options: 4 };
        assert_eq!(
            err.to_string(),
            "Correct answer index 4 is out of bounds for 4 options"
        );
    }

    #[test]
    fn test_admission_close_codes() {
        assert_eq!(LiveError::RoomNotFound("X".into()).close_code(), 4004);
        assert_eq!(LiveError::NameTaken("Alice".into()).close_code(), 4009);
        assert_eq!(LiveError::RoundInProgress.close_code(), 4000);
    }

    #[test]
    fn test_admission_classification() {
        assert!(LiveError::RoomNotFound("X".into()).is_admission_error());
        assert!(LiveError::NameTaken("Alice".into()).is_admission_error());
        assert!(!LiveError::DuplicateAnswer("Bob".into()).is_admission_error());
    }
}
