use std::sync::Arc;

use serde::Deserialize;
use warp::http::StatusCode;
use warp::Filter;

use super::live_websocket;
use crate::config::EngineConfig;
use crate::live::LiveServer;

/// Connection-establishment parameters for a player join.
#[derive(Debug, Deserialize)]
struct JoinQuery {
    code: String,
    name: String,
}

/// Builds the live-quiz routes around one shared engine instance: the host
/// and player WebSocket endpoints plus the pre-join room lookup.
pub fn live_routes(
    config: EngineConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let server = Arc::new(LiveServer::new(config));
    server.clone().start_idle_sweeper();

    let host = warp::path!("live" / "host")
        .and(warp::ws())
        .and(with_server(server.clone()))
        .map(|ws: warp::ws::Ws, server: Arc<LiveServer>| {
            ws.on_upgrade(move |websocket| live_websocket::handle_host_socket(websocket, server))
        });

    let join = warp::path!("live" / "join")
        .and(warp::ws())
        .and(warp::query::<JoinQuery>())
        .and(with_server(server.clone()))
        .map(|ws: warp::ws::Ws, query: JoinQuery, server: Arc<LiveServer>| {
            ws.on_upgrade(move |websocket| {
                live_websocket::handle_player_socket(websocket, server, query.code, query.name)
            })
        });

    let lookup = warp::path!("live" / "rooms" / String)
        .and(warp::get())
        .and(with_server(server))
        .and_then(room_lookup);

    host.or(join).or(lookup)
}

/// Confirms room existence before a connection attempt.
async fn room_lookup(
    code: String,
    server: Arc<LiveServer>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match server.room_overview(&code).await {
        Some(overview) => Ok(warp::reply::with_status(
            warp::reply::json(&overview),
            StatusCode::OK,
        )),
        None => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": format!("Room {} not found", code)
            })),
            StatusCode::NOT_FOUND,
        )),
    }
}

pub fn live_health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
{
    warp::path!("live" / "health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "service": "Live Quiz Server",
            "version": "0.1.0"
        }))
    })
}

fn with_server(
    server: Arc<LiveServer>,
) -> impl Filter<Extract = (Arc<LiveServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || server.clone())
}
