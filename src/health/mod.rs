//! Network health probe
//!
//! Best-effort answer to "can we usefully reach the exchange right now":
//! outward reachability plus tunneled-route detection. Every check returns a
//! boolean; inspection failures count as a negative signal, never as an error.

mod inspector;

pub use inspector::{
    find_interface_keyword, find_keyword, routes_indicate_tunnel, OsInspector, SystemInspector,
    INTERFACE_KEYWORDS, PROCESS_KEYWORDS,
};

#[cfg(test)]
pub use inspector::MockSystemInspector;

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Result of a full health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub internet_connected: bool,
    pub tunnel_detected: bool,
}

/// Point-in-time connectivity and tunnel checks
#[derive(Clone)]
pub struct NetworkHealthProbe {
    connectivity_addr: String,
    connectivity_timeout: Duration,
    inspector: Arc<dyn SystemInspector>,
    manual_override: Option<bool>,
}

impl NetworkHealthProbe {
    /// Create a probe that inspects the host OS
    pub fn new(connectivity_addr: impl Into<String>, connectivity_timeout: Duration) -> Self {
        Self {
            connectivity_addr: connectivity_addr.into(),
            connectivity_timeout,
            inspector: Arc::new(OsInspector),
            manual_override: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut probe = Self::new(
            config.connectivity_check_addr.clone(),
            config.connectivity_check_timeout(),
        );
        probe.set_manual_override(config.tunnel_override);
        probe
    }

    /// Replace the system inspector used by the tunnel heuristics
    pub fn with_inspector(mut self, inspector: Arc<dyn SystemInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Force the tunnel check result, or `None` to go back to detection
    pub fn set_manual_override(&mut self, manual_override: Option<bool>) {
        if self.manual_override != manual_override {
            info!(manual_override = ?manual_override, "Tunnel detection override changed");
        }
        self.manual_override = manual_override;
    }

    pub fn manual_override(&self) -> Option<bool> {
        self.manual_override
    }

    /// Try to open a TCP connection to a well-known endpoint within the timeout
    pub async fn check_internet(&self) -> bool {
        match timeout(
            self.connectivity_timeout,
            TcpStream::connect(self.connectivity_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                warn!(addr = %self.connectivity_addr, error = %e, "Connectivity check failed");
                false
            }
            Err(_) => {
                warn!(
                    addr = %self.connectivity_addr,
                    timeout_ms = self.connectivity_timeout.as_millis() as u64,
                    "Connectivity check timed out"
                );
                false
            }
        }
    }

    /// Whether traffic appears to leave through a tunnel.
    ///
    /// Blocks on host inspection; call from a blocking context.
    pub fn check_tunneled_route(&self) -> bool {
        if let Some(forced) = self.manual_override {
            debug!(forced, "Using tunnel detection override");
            return forced;
        }
        detect_tunnel(self.inspector.as_ref())
    }

    /// Full check: reachability first, then tunnel detection off the async runtime
    pub async fn check(&self) -> HealthReport {
        let internet_connected = self.check_internet().await;

        let tunnel_detected = match self.manual_override {
            Some(forced) => forced,
            // No route out means no tunnel worth detecting
            None if !internet_connected => false,
            None => {
                let inspector = Arc::clone(&self.inspector);
                tokio::task::spawn_blocking(move || detect_tunnel(inspector.as_ref()))
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Tunnel detection task failed");
                        false
                    })
            }
        };

        let report = HealthReport {
            internet_connected,
            tunnel_detected,
        };
        debug!(?report, "Network health checked");
        report
    }
}

/// OR of the three heuristics; the first positive signal wins
fn detect_tunnel(inspector: &dyn SystemInspector) -> bool {
    if let Some(keyword) = inspect("interfaces", || inspector.interface_listing())
        .and_then(|listing| find_interface_keyword(&listing))
    {
        info!(keyword, "Tunnel detected: matching network interface");
        return true;
    }

    if let Some(keyword) = inspect("processes", || inspector.process_listing())
        .and_then(|listing| find_keyword(&listing, PROCESS_KEYWORDS))
    {
        info!(keyword, "Tunnel detected: matching VPN client process");
        return true;
    }

    if inspect("routes", || inspector.routing_table())
        .map(|table| routes_indicate_tunnel(&table))
        .unwrap_or(false)
    {
        info!("Tunnel detected: routing table carries a tunnel default route");
        return true;
    }

    info!("No tunnel detected through interfaces, processes or routes");
    false
}

/// Run one inspection, turning failure into "no signal"
fn inspect(source: &str, read: impl FnOnce() -> std::io::Result<String>) -> Option<String> {
    match read() {
        Ok(listing) => Some(listing),
        Err(e) => {
            debug!(source, error = %e, "System inspection unavailable");
            None
        }
    }
}
