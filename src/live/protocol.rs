use serde::{Deserialize, Serialize};

/// Messages received from a connected client. Hosts may send `new_question`
/// and `close_room`; players may send `answer`. A message outside the
/// sender's role is rejected with an `error` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NewQuestion {
        question: String,
        options: Vec<String>,
        correct_answer: usize,
        time_limit: u64,
    },

    CloseRoom,

    Answer {
        option: usize,
    },
}

/// Messages sent by the server. This enum is the full outbound vocabulary;
/// nothing outside it ever goes on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated {
        room_code: String,
    },

    PlayerCount {
        count: usize,
    },

    AnswerCount {
        answered: usize,
    },

    Results {
        top_5: Vec<ScoreEntry>,
        correct_answers: usize,
        total_answers: usize,
    },

    PlayerJoined {
        username: String,
    },

    Question {
        question: String,
        options: Vec<String>,
        time_limit: u64,
        /// Unix timestamp in milliseconds of the question broadcast.
        question_start_time: u64,
    },

    QuestionEnded {
        correct_answer: usize,
    },

    RoomClosed {
        reason: String,
    },

    Heartbeat,

    Error {
        message: String,
    },
}

/// One row of a round leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub username: String,
    /// Points awarded for this round.
    pub points: u64,
    /// Cumulative score in the room after this round.
    pub total_score: u64,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_tags() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"new_question","question":"Capital of France?","options":["Paris","Lyon"],"correct_answer":0,"time_limit":10}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::NewQuestion { .. }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"close_room"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CloseRoom));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"answer","option":2}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Answer { option: 2 }));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"start_dance_party"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"answer"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_serialization() {
        let json = serde_json::to_string(&ServerMessage::RoomCreated {
            room_code: "AB12CD34".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"room_created","room_code":"AB12CD34"}"#);

        let json = serde_json::to_string(&ServerMessage::Heartbeat).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat"}"#);

        let json = serde_json::to_string(&ServerMessage::RoomClosed {
            reason: "closed by host".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"room_closed","reason":"closed by host"}"#);
    }

    #[test]
    fn test_results_shape() {
        let msg = ServerMessage::Results {
            top_5: vec![ScoreEntry {
                username: "Alice".to_string(),
                points: 800,
                total_score: 1800,
            }],
            correct_answers: 1,
            total_answers: 2,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "results");
        assert_eq!(value["top_5"][0]["username"], "Alice");
        assert_eq!(value["correct_answers"], 1);
        assert_eq!(value["total_answers"], 2);
    }
}
