//! L2 Feed Core
//!
//! Resilient ingestion of level-2 order-book snapshots from a WebSocket feed:
//! network health probing, bounded reconnection, strict message parsing and
//! analytics over the latest book.

pub mod config;
pub mod consumer;
pub mod error;
pub mod health;
pub mod metrics;
pub mod orderbook;
pub mod parser;
pub mod session;
pub mod websocket;

pub use config::Config;
pub use consumer::{BookConsumer, CallbackConsumer, ChannelConsumer, FeedEvent};
pub use error::{FeedError, Result};
pub use health::{HealthReport, NetworkHealthProbe, OsInspector, SystemInspector};
pub use metrics::FeedMetrics;
pub use orderbook::{
    BookSnapshot, DepthPoint, ExecutionError, Level, OrderBookMetrics, OrderBookView, Side,
    TradeSide,
};
pub use parser::{parse_snapshot, FeedMessage};
pub use session::{
    CloseReason, ConnectionStatus, LatencyStats, LatencyTracker, ReconnectPolicy, SessionHandle,
    SessionState, StreamSession,
};
pub use websocket::{FeedTransport, WebSocketClient};
