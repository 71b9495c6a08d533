//! Error types for the feed ingestion core

use thiserror::Error;

/// Feed ingestion errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket connection error: {0}")]
    Connection(String),

    #[error("Connection closed: {0}")]
    Closed(String),

    #[error("WebSocket message error: {0}")]
    Message(String),

    #[error("Failed to parse message: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics registration error: {0}")]
    Metrics(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Not connected")]
    NotConnected,
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                FeedError::Closed(err.to_string())
            }
            other => FeedError::Message(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for FeedError {
    fn from(err: config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::Config(format!("invalid endpoint url: {}", err))
    }
}

impl From<prometheus::Error> for FeedError {
    fn from(err: prometheus::Error) -> Self {
        FeedError::Metrics(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
