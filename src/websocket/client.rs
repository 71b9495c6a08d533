//! WebSocket client for the L2 order-book feed
//!
//! Handles connection and message reception for a single endpoint.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::FeedTransport;
use crate::config::Config;
use crate::error::{FeedError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for a single connection
pub struct WebSocketClient {
    stream: Option<WsStream>,
    endpoint: String,
    connect_timeout: Duration,
}

impl WebSocketClient {
    /// Create a new WebSocket client
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            endpoint: endpoint.to_string(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.endpoint_url, config.connect_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FeedTransport for WebSocketClient {
    /// Connect to the WebSocket endpoint
    async fn connect(&mut self) -> Result<()> {
        self.close().await;

        info!(url = %self.endpoint, "Connecting to feed WebSocket");

        let (ws_stream, response) =
            timeout(self.connect_timeout, connect_async(self.endpoint.as_str()))
                .await
                .map_err(|_| FeedError::ConnectionTimeout)?
                .map_err(|e| FeedError::Connection(format!("Failed to connect: {}", e)))?;

        info!(status = ?response.status(), "WebSocket connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Receive the next message
    async fn recv(&mut self) -> Result<Option<String>> {
        let stream = self.stream.as_mut().ok_or(FeedError::NotConnected)?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Received text message");
                Ok(Some(text))
            }
            Some(Ok(Message::Binary(data))) => {
                // Some gateways frame JSON as binary
                let text = String::from_utf8_lossy(&data).to_string();
                Ok(Some(text))
            }
            Some(Ok(Message::Ping(data))) => {
                debug!("Received ping, sending pong");
                if let Err(e) = stream.send(Message::Pong(data)).await {
                    warn!(error = %e, "Failed to answer ping");
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => {
                debug!("Received pong");
                Ok(None)
            }
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                self.stream = None;
                let reason = frame
                    .map(|f| format!("{} {}", f.code, f.reason))
                    .unwrap_or_else(|| "close frame".to_string());
                Err(FeedError::Closed(reason))
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                self.stream = None;
                Err(e.into())
            }
            None => {
                warn!("WebSocket stream ended");
                self.stream = None;
                Err(FeedError::Closed("Stream ended".to_string()))
            }
        }
    }

    /// Send a ping to keep connection alive
    async fn ping(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(FeedError::NotConnected)?;
        stream
            .send(Message::Ping(vec![]))
            .await
            .map_err(|e| FeedError::Message(e.to_string()))
    }

    /// Close the connection
    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }

    /// Check if connected
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
