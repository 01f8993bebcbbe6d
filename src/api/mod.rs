pub mod live_routes;
mod live_websocket;
