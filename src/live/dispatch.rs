use tokio::sync::mpsc;
use warp::ws::Message;

use crate::live::protocol::ServerMessage;

/// Outbound half of a client connection. The WebSocket handler owns the
/// receiving side and forwards frames onto the socket.
pub type Connection = mpsc::UnboundedSender<Message>;

/// Targeted send. Delivery is best-effort: a closed channel is logged and
/// never fails the caller.
pub fn send_to(connection: &Connection, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(text) => {
            if connection.send(Message::text(text)).is_err() {
                tracing::debug!("Dropping message for disconnected client");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize outbound message");
        }
    }
}

/// Fans one message out to a set of connections. The payload is serialized
/// once; a failed delivery to one connection does not abort the rest.
pub fn fan_out<'a>(
    connections: impl Iterator<Item = &'a Connection>,
    message: &ServerMessage,
) {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize broadcast message");
            return;
        }
    };

    for connection in connections {
        if connection.send(Message::text(text.clone())).is_err() {
            tracing::debug!("Skipping broadcast to disconnected client");
        }
    }
}

/// Sends a close frame with an application close code and reason, used when
/// a connection is refused at admission or the room is torn down.
pub fn send_close(connection: &Connection, code: u16, reason: &str) {
    let _ = connection.send(Message::close_with(code, reason.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_delivers_serialized_message() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_to(&tx, &ServerMessage::PlayerCount { count: 3 });

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.to_str().unwrap(), r#"{"type":"player_count","count":3}"#);
    }

    #[tokio::test]
    async fn test_fan_out_survives_dead_connection() {
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();

        let connections = [dead_tx, live_tx];
        fan_out(connections.iter(), &ServerMessage::Heartbeat);

        let msg = live_rx.recv().await.unwrap();
        assert_eq!(msg.to_str().unwrap(), r#"{"type":"heartbeat"}"#);
    }

    #[tokio::test]
    async fn test_send_close_carries_code_and_reason() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_close(&tx, 4004, "room not found");

        let msg = rx.recv().await.unwrap();
        assert!(msg.is_close());
    }
}
