//! WebSocket sessions.
//!
//! - [`WebSocket`]: an upgraded connection, reading and writing frames on the connection's
//!   own buffers with keep-alive pings
//! - [`SessionStore`] / [`PollSession`]: the same message exchange emulated over long
//!   polling for clients that can not upgrade

mod poll;
mod socket;

pub use poll::{PollSession, SessionStore};
pub use socket::{Message, WebSocket, WebSocketState};
