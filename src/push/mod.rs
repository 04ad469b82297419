//! Push channel: frame decoding and the reconnecting WebSocket client.

pub mod decoder;
pub mod websocket;

pub use decoder::{decode_container, decode_message, PushEvent};
pub use websocket::{ConnectionState, PushChannel, ReconnectConfig};
