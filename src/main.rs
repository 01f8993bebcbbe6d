mod api;
mod config;
mod error;
mod live;

use config::Config;
use warp::Filter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let routes = api::live_routes::live_routes(config.engine.clone())
        .or(api::live_routes::live_health_check());

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting live quiz server"
    );

    warp::serve(routes).run(config.bind_address()).await;
}
