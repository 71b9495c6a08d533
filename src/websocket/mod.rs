//! WebSocket module for the L2 feed connection

mod client;
mod transport;

pub use client::WebSocketClient;
pub use transport::FeedTransport;
