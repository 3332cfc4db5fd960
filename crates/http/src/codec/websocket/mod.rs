//! WebSocket wire format: frames, their codecs and the opening handshake.
//!
//! The session state machine built on top of these lives in [`crate::websocket`].

mod decoder;
mod encoder;
mod frame;
mod handshake;

pub use decoder::{DEFAULT_MAX_PAYLOAD, FrameDecoder};
pub use encoder::FrameEncoder;
pub use frame::{CloseStatus, Frame, MAX_CONTROL_PAYLOAD, Opcode};
pub use handshake::{accept_key, handshake_response};
