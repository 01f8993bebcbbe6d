pub mod dispatch;
pub mod protocol;
mod room;
mod round;
mod scoring;
mod server;

pub use server::{LiveServer, RoomOverview, REASON_CLOSED_BY_HOST, REASON_HOST_DISCONNECTED};
