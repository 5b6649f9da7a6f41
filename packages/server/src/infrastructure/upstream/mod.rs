//! UpstreamConnector の実装

mod unavailable;
mod websocket;

pub use unavailable::UnavailableUpstreamConnector;
pub use websocket::WebSocketUpstreamConnector;
