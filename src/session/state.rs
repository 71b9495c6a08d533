//! Session lifecycle states and the status events reported to consumers

use serde::Serialize;
use std::fmt;

/// Why a live connection ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// Peer closed the stream
    Normal(String),
    /// Transport or protocol failure
    Error(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Normal(reason) => write!(f, "closed: {}", reason),
            CloseReason::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Stream session state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Probing,
    Connecting,
    Streaming,
    Closed(CloseReason),
    /// No internet at probe time, or the reconnect budget is spent
    Terminated,
}

impl SessionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }
}

/// Connection status event delivered to the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected(String),
    /// Emitted before waiting to retry
    Reconnecting { attempt: u32, max_attempts: u32 },
    NoInternet,
    /// Non-fatal warning: the feed may still be reachable
    VpnNotDetected,
    ReconnectFailed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Disconnected(reason) => write!(f, "Disconnected ({})", reason),
            ConnectionStatus::Reconnecting {
                attempt,
                max_attempts,
            } => write!(f, "Reconnecting ({}/{})", attempt, max_attempts),
            ConnectionStatus::NoInternet => write!(f, "No Internet Connection"),
            ConnectionStatus::VpnNotDetected => write!(f, "VPN Not Detected"),
            ConnectionStatus::ReconnectFailed => write!(f, "Reconnection Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::NoInternet.to_string(), "No Internet Connection");
        assert_eq!(
            ConnectionStatus::Reconnecting {
                attempt: 2,
                max_attempts: 10
            }
            .to_string(),
            "Reconnecting (2/10)"
        );
        assert_eq!(
            ConnectionStatus::Disconnected(CloseReason::Normal("bye".into()).to_string())
                .to_string(),
            "Disconnected (closed: bye)"
        );
    }
}
