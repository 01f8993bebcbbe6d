use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};
use warp::ws::{Message, WebSocket};

use crate::error::LiveError;
use crate::live::protocol::{ClientMessage, ServerMessage};
use crate::live::{dispatch, LiveServer, REASON_CLOSED_BY_HOST};

/// Serves a host connection for its whole lifetime: creates the room,
/// dispatches host messages, heartbeats, and tears the room down when the
/// connection goes away.
pub async fn handle_host_socket(websocket: WebSocket, server: Arc<LiveServer>) {
    tracing::info!("New host WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Spawn task to forward outbound messages to the client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let code = match server.create_room(tx.clone()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create room");
            dispatch::send_close(&tx, 1011, "could not create room");
            drop(tx);
            let _ = sender_task.await;
            return;
        }
    };
    dispatch::send_to(
        &tx,
        &ServerMessage::RoomCreated {
            room_code: code.clone(),
        },
    );

    run_connection(&mut ws_receiver, &server, &tx, |text| {
        let server = server.clone();
        let code = code.clone();
        let tx = tx.clone();
        async move { handle_host_message(&server, &code, &tx, &text).await }
    })
    .await;

    // Explicit close already removed the room; this is then a no-op
    server.host_disconnected(&code).await;
    sender_task.abort();
    tracing::info!(room_code = %code, "Host WebSocket connection closed");
}

/// Serves a player connection. Admission happens before the message loop;
/// a refused join closes the socket with a distinguishing status code
/// without touching room state.
pub async fn handle_player_socket(
    websocket: WebSocket,
    server: Arc<LiveServer>,
    code: String,
    name: String,
) {
    tracing::info!(room_code = %code, player = %name, "New player WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    if let Err(e) = server.join_room(&code, &name, tx.clone()).await {
        tracing::info!(room_code = %code, player = %name, error = %e, "Player admission refused");
        dispatch::send_close(&tx, e.close_code(), &e.to_string());
        drop(tx);
        let _ = sender_task.await;
        return;
    }

    run_connection(&mut ws_receiver, &server, &tx, |text| {
        let server = server.clone();
        let code = code.clone();
        let name = name.clone();
        let tx = tx.clone();
        async move {
            handle_player_message(&server, &code, &name, &tx, &text).await;
            false
        }
    })
    .await;

    server.remove_player(&code, &name).await;
    sender_task.abort();
    tracing::info!(room_code = %code, player = %name, "Player WebSocket connection closed");
}

/// Shared receive loop: inbound frames refresh liveness, text frames go to
/// the role's message handler, and every heartbeat tick sends the
/// application heartbeat plus a transport ping. A connection silent past
/// the configured timeout is proactively pruned.
async fn run_connection<F, Fut>(
    ws_receiver: &mut (impl futures::Stream<Item = std::result::Result<Message, warp::Error>> + Unpin),
    server: &Arc<LiveServer>,
    tx: &dispatch::Connection,
    mut on_text: F,
) where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let mut heartbeat = interval(server.config().heartbeat_interval);
    heartbeat.tick().await; // the first tick fires immediately
    let connection_timeout = server.config().connection_timeout;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(message)) => {
                        last_seen = Instant::now();
                        if message.is_close() {
                            break;
                        }
                        if let Ok(text) = message.to_str() {
                            if on_text(text.to_string()).await {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket error");
                        break;
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() >= connection_timeout {
                    tracing::warn!("Connection silent past timeout, pruning");
                    break;
                }
                dispatch::send_to(tx, &ServerMessage::Heartbeat);
                let _ = tx.send(Message::ping(Vec::new()));
            }
        }
    }
}

/// Returns true when the host asked to close the room and the loop should
/// end.
async fn handle_host_message(
    server: &Arc<LiveServer>,
    code: &str,
    tx: &dispatch::Connection,
    text: &str,
) -> bool {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(raw_message = %text, "Failed to parse host message");
            dispatch::send_to(tx, &ServerMessage::error(LiveError::from(e).to_string()));
            return false;
        }
    };

    match message {
        ClientMessage::NewQuestion {
            question,
            options,
            correct_answer,
            time_limit,
        } => {
            if let Err(e) = server
                .start_round(code, question, options, correct_answer, time_limit)
                .await
            {
                dispatch::send_to(tx, &ServerMessage::error(e.to_string()));
            }
            false
        }
        ClientMessage::CloseRoom => {
            if let Err(e) = server.close_room(code, REASON_CLOSED_BY_HOST).await {
                dispatch::send_to(tx, &ServerMessage::error(e.to_string()));
            }
            true
        }
        ClientMessage::Answer { .. } => {
            let err = LiveError::UnexpectedMessage("answer".to_string());
            dispatch::send_to(tx, &ServerMessage::error(err.to_string()));
            false
        }
    }
}

async fn handle_player_message(
    server: &Arc<LiveServer>,
    code: &str,
    name: &str,
    tx: &dispatch::Connection,
    text: &str,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(raw_message = %text, "Failed to parse player message");
            dispatch::send_to(tx, &ServerMessage::error(LiveError::from(e).to_string()));
            return;
        }
    };

    match message {
        ClientMessage::Answer { option } => {
            if let Err(e) = server.submit_answer(code, name, option).await {
                dispatch::send_to(tx, &ServerMessage::error(e.to_string()));
            }
        }
        ClientMessage::NewQuestion { .. } => {
            let err = LiveError::UnexpectedMessage("new_question".to_string());
            dispatch::send_to(tx, &ServerMessage::error(err.to_string()));
        }
        ClientMessage::CloseRoom => {
            let err = LiveError::UnexpectedMessage("close_room".to_string());
            dispatch::send_to(tx, &ServerMessage::error(err.to_string()));
        }
    }
}
