// Live Quiz Server CLI Validation Tool
// Exercises the room protocol end to end: health checks, hosting, joining and
// a scripted validation scenario

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::io::{self, Write};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Parser)]
#[command(name = "quiz-live-cli")]
#[command(about = "Live Quiz Server CLI Validation Tool", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:8080)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Look up a room before joining
    Lookup {
        /// Room code to check
        code: String,
    },

    /// Host a room and print everything the server sends
    Host {
        /// Send a sample question as soon as a player joins
        #[arg(short, long)]
        question: bool,

        /// Answer window for the sample question in seconds
        #[arg(short, long, default_value_t = 10)]
        time_limit: u64,
    },

    /// Join a room as a player
    Join {
        /// Room code to join
        #[arg(short, long)]
        code: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Option index to submit when a question arrives
        #[arg(short, long)]
        answer: Option<usize>,
    },

    /// Run the automated end-to-end validation scenario
    Validate,

    /// Interactive mode - send raw JSON messages as a host
    Interactive,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Lookup { code } => lookup_room(&cli.server, code).await,
        Commands::Host {
            question,
            time_limit,
        } => host_room(&cli.server, *question, *time_limit).await,
        Commands::Join { code, name, answer } => join_room(&cli.server, code, name, *answer).await,
        Commands::Validate => run_validation(&cli.server).await,
        Commands::Interactive => interactive_mode(&cli.server).await,
    }
}

async fn check_health(server: &str) {
    let url = format!("http://{}/live/health", server);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            let body: Value = resp.json().await.unwrap_or_default();
            println!("{} {}", "Server healthy:".green(), body);
        }
        Ok(resp) => println!("{} status {}", "Unexpected response:".yellow(), resp.status()),
        Err(e) => println!("{} {}", "Cannot reach server:".red(), e),
    }
}

async fn lookup_room(server: &str, code: &str) {
    let url = format!("http://{}/live/rooms/{}", server, code);
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            let body: Value = resp.json().await.unwrap_or_default();
            println!(
                "{} {} ({} players)",
                "Room exists:".green(),
                body["room_code"],
                body["player_count"]
            );
        }
        Ok(_) => println!("{} {}", "Room not found:".yellow(), code),
        Err(e) => println!("{} {}", "Cannot reach server:".red(), e),
    }
}

async fn host_room(server: &str, send_question: bool, time_limit: u64) {
    let url = format!("ws://{}/live/host", server);
    let (ws, _) = match connect_async(&url).await {
        Ok(ok) => ok,
        Err(e) => {
            println!("{} {}", "Cannot connect:".red(), e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let Some(created) = next_of_type(&mut source, "room_created", 5).await else {
        println!("{}", "Did not receive room_created".red());
        return;
    };
    let code = created["room_code"].as_str().unwrap_or("").to_string();
    println!("{} {}", "Room created:".green(), code.bold());
    println!("Players join with: --code {} --name <name>", code);

    let mut question_sent = false;
    while let Some(Ok(message)) = source.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if value["type"] == "heartbeat" {
            continue;
        }
        println!("{} {}", "<-".cyan(), text);

        if send_question && !question_sent && value["type"] == "player_count" {
            let question = json!({
                "type": "new_question",
                "question": "What is 2 + 2?",
                "options": ["3", "4", "5", "22"],
                "correct_answer": 1,
                "time_limit": time_limit,
            });
            if sink.send(Message::Text(question.to_string())).await.is_err() {
                break;
            }
            println!("{} sample question sent", "->".cyan());
            question_sent = true;
        }
    }
    println!("{}", "Connection closed".yellow());
}

async fn join_room(server: &str, code: &str, name: &str, answer: Option<usize>) {
    let url = format!(
        "ws://{}/live/join?code={}&name={}",
        server,
        urlencoding::encode(code),
        urlencoding::encode(name)
    );
    let (ws, _) = match connect_async(&url).await {
        Ok(ok) => ok,
        Err(e) => {
            println!("{} {}", "Cannot connect:".red(), e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();
    println!("{} joined room {} as {}", "OK".green(), code, name);

    while let Some(Ok(message)) = source.next().await {
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                if value["type"] == "heartbeat" {
                    continue;
                }
                println!("{} {}", "<-".cyan(), text);

                if value["type"] == "question" {
                    if let Some(option) = answer {
                        let msg = json!({ "type": "answer", "option": option });
                        if sink.send(Message::Text(msg.to_string())).await.is_err() {
                            break;
                        }
                        println!("{} answered option {}", "->".cyan(), option);
                    }
                }
            }
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    println!(
                        "{} {} ({})",
                        "Closed:".yellow(),
                        frame.reason,
                        u16::from(frame.code)
                    );
                }
                break;
            }
            _ => {}
        }
    }
}

async fn run_validation(server: &str) {
    println!("{}", "Running live quiz validation scenario".bold());
    let mut failures = 0;

    // Health endpoint
    let health = reqwest::get(format!("http://{}/live/health", server)).await;
    report(
        "health endpoint responds",
        matches!(&health, Ok(resp) if resp.status().is_success()),
        &mut failures,
    );

    // Host a room
    let Ok((host_ws, _)) = connect_async(format!("ws://{}/live/host", server)).await else {
        println!("{}", "Cannot connect host socket, aborting".red());
        return;
    };
    let (mut host_sink, mut host_source) = host_ws.split();

    let created = next_of_type(&mut host_source, "room_created", 5).await;
    let code = created
        .as_ref()
        .and_then(|v| v["room_code"].as_str())
        .unwrap_or("")
        .to_string();
    report("host receives an 8-character room code", code.len() == 8, &mut failures);

    // Lookup sees the room
    let lookup = reqwest::get(format!("http://{}/live/rooms/{}", server, code)).await;
    report(
        "lookup endpoint confirms the room",
        matches!(&lookup, Ok(resp) if resp.status().is_success()),
        &mut failures,
    );

    // Two players join
    let Some((mut alice_sink, mut alice_source)) = connect_player(server, &code, "Alice").await
    else {
        println!("{}", "Alice could not join, aborting".red());
        return;
    };
    let Some((mut bob_sink, mut bob_source)) = connect_player(server, &code, "Bob").await else {
        println!("{}", "Bob could not join, aborting".red());
        return;
    };

    let count = wait_for_player_count(&mut host_source, 2, 5).await;
    report("host sees player_count=2", count, &mut failures);

    // Duplicate name is refused
    let dup = connect_player(server, &code, "Alice").await;
    report("duplicate name is refused", dup.is_none(), &mut failures);

    // A question round
    let question = json!({
        "type": "new_question",
        "question": "What is 2 + 2?",
        "options": ["3", "4", "5", "22"],
        "correct_answer": 1,
        "time_limit": 10,
    });
    let _ = host_sink.send(Message::Text(question.to_string())).await;

    let alice_q = next_of_type(&mut alice_source, "question", 5).await;
    let bob_q = next_of_type(&mut bob_source, "question", 5).await;
    report(
        "players receive the question",
        alice_q.is_some() && bob_q.is_some(),
        &mut failures,
    );

    let _ = alice_sink
        .send(Message::Text(json!({"type": "answer", "option": 1}).to_string()))
        .await;
    let _ = bob_sink
        .send(Message::Text(json!({"type": "answer", "option": 0}).to_string()))
        .await;

    let results = next_of_type(&mut host_source, "results", 15).await;
    let results_ok = results
        .as_ref()
        .map(|r| {
            r["total_answers"] == 2
                && r["correct_answers"] == 1
                && r["top_5"][0]["username"] == "Alice"
        })
        .unwrap_or(false);
    report("results rank Alice first with 1 correct of 2", results_ok, &mut failures);

    let ended = next_of_type(&mut alice_source, "question_ended", 5).await;
    report(
        "players receive question_ended with the solution",
        matches!(&ended, Some(v) if v["correct_answer"] == 1),
        &mut failures,
    );

    // Explicit close reaches the players
    let _ = host_sink
        .send(Message::Text(json!({"type": "close_room"}).to_string()))
        .await;
    let closed = next_of_type(&mut bob_source, "room_closed", 5).await;
    report("players receive room_closed", closed.is_some(), &mut failures);

    println!();
    if failures == 0 {
        println!("{}", "All validation checks passed".green().bold());
    } else {
        println!("{}", format!("{} validation check(s) failed", failures).red().bold());
    }
}

async fn interactive_mode(server: &str) {
    let url = format!("ws://{}/live/host", server);
    let (ws, _) = match connect_async(&url).await {
        Ok(ok) => ok,
        Err(e) => {
            println!("{} {}", "Cannot connect:".red(), e);
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    if let Some(created) = next_of_type(&mut source, "room_created", 5).await {
        println!("{} {}", "Room created:".green(), created["room_code"]);
    }
    println!("Enter raw JSON messages, or 'quit' to exit.");

    loop {
        print!("{} ", ">".bold());
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        if sink.send(Message::Text(line.to_string())).await.is_err() {
            println!("{}", "Connection closed".yellow());
            break;
        }

        // Drain replies for a short window
        while let Ok(Some(Ok(Message::Text(text)))) =
            timeout(Duration::from_millis(500), source.next()).await
        {
            println!("{} {}", "<-".cyan(), text);
        }
    }
}

/// Reads frames until a message of the wanted type arrives, skipping
/// heartbeats and unrelated traffic.
async fn next_of_type(source: &mut WsSource, wanted: &str, timeout_secs: u64) -> Option<Value> {
    let deadline = Duration::from_secs(timeout_secs);
    let result = timeout(deadline, async {
        while let Some(Ok(message)) = source.next().await {
            if let Message::Text(text) = message {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if value["type"] == wanted {
                        return Some(value);
                    }
                }
            }
        }
        None
    })
    .await;
    result.unwrap_or(None)
}

/// Connects a player and waits for the join confirmation; None when the
/// server refuses the connection.
async fn connect_player(server: &str, code: &str, name: &str) -> Option<(WsSink, WsSource)> {
    let url = format!(
        "ws://{}/live/join?code={}&name={}",
        server,
        urlencoding::encode(code),
        urlencoding::encode(name)
    );
    let (ws, _) = connect_async(&url).await.ok()?;
    let (sink, mut source) = ws.split();

    next_of_type(&mut source, "player_joined", 5)
        .await
        .map(|_| (sink, source))
}

async fn wait_for_player_count(source: &mut WsSource, expected: u64, timeout_secs: u64) -> bool {
    let deadline = Duration::from_secs(timeout_secs);
    timeout(deadline, async {
        while let Some(Ok(message)) = source.next().await {
            if let Message::Text(text) = message {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if value["type"] == "player_count" && value["count"] == expected {
                        return true;
                    }
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false)
}

fn report(check: &str, passed: bool, failures: &mut u32) {
    if passed {
        println!("{} {}", "PASS".green().bold(), check);
    } else {
        println!("{} {}", "FAIL".red().bold(), check);
        *failures += 1;
    }
}
