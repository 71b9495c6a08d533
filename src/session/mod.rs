//! Stream session
//!
//! Owns the live feed connection and drives it through
//! `Idle -> Probing -> Connecting -> Streaming -> Closed -> (Probing | Terminated)`.
//! Messages are processed strictly one at a time in arrival order. Stop and
//! reconnect requests are cooperative: they take effect at the loop's check
//! points (between messages and while waiting), never mid-message.
//!
//! A session is armed when built. `stop` latches until `resume` is called, so a
//! stop issued before the session starts, or racing a reconnect, is never lost.

mod latency;
mod reconnect;
mod state;

pub use latency::{LatencyStats, LatencyTracker, DEFAULT_LATENCY_CAPACITY};
pub use reconnect::{ReconnectPhase, ReconnectPolicy};
pub use state::{CloseReason, ConnectionStatus, SessionState};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::{error::Elapsed, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::consumer::BookConsumer;
use crate::error::{FeedError, Result};
use crate::health::NetworkHealthProbe;
use crate::metrics::FeedMetrics;
use crate::parser::parse_snapshot;
use crate::websocket::FeedTransport;

/// Quiet period after which the peer is pinged
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests delivered from a [`SessionHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Reconnect,
    TunnelOverride(Option<bool>),
}

/// Cloneable remote control for a session running on another task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    running: Arc<watch::Sender<bool>>,
    control: mpsc::UnboundedSender<Control>,
}

impl SessionHandle {
    /// Ask the session to stop at its next check point; idempotent
    pub fn stop(&self) {
        self.running.send_replace(false);
    }

    /// Re-arm a stopped session so the next `start` runs
    pub fn resume(&self) {
        self.running.send_replace(true);
    }

    /// Reset the attempt budget and, if terminated, start over
    pub fn request_reconnect(&self) {
        if self.control.send(Control::Reconnect).is_err() {
            debug!("Reconnect requested for a dropped session");
        }
    }

    /// Force the tunnel check result, `None` to return to detection
    pub fn set_manual_tunnel_override(&self, manual_override: Option<bool>) {
        if self
            .control
            .send(Control::TunnelOverride(manual_override))
            .is_err()
        {
            debug!("Tunnel override set for a dropped session");
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }
}

enum StreamExit {
    Stopped,
    Closed(CloseReason),
}

enum Wake {
    Flag,
    Control(Control),
    Frame(std::result::Result<Result<Option<String>>, Elapsed>),
}

/// One live feed connection and its recovery logic
pub struct StreamSession<T: FeedTransport, C: BookConsumer> {
    transport: T,
    consumer: C,
    probe: NetworkHealthProbe,
    policy: ReconnectPolicy,
    latency: LatencyTracker,
    metrics: Option<FeedMetrics>,
    idle_timeout: Duration,
    reprobe_on_reconnect: bool,
    state: SessionState,
    last_status: Option<ConnectionStatus>,
    running: Arc<watch::Sender<bool>>,
    running_rx: watch::Receiver<bool>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl<T: FeedTransport, C: BookConsumer> StreamSession<T, C> {
    pub fn new(
        transport: T,
        consumer: C,
        probe: NetworkHealthProbe,
        policy: ReconnectPolicy,
    ) -> Self {
        let (running, running_rx) = watch::channel(true);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Self {
            transport,
            consumer,
            probe,
            policy,
            latency: LatencyTracker::default(),
            metrics: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reprobe_on_reconnect: true,
            state: SessionState::Idle,
            last_status: None,
            running: Arc::new(running),
            running_rx,
            control_tx,
            control_rx,
        }
    }

    /// Build a session with probe, policy and timeouts taken from `config`
    pub fn from_config(config: &Config, transport: T, consumer: C) -> Self {
        Self::new(
            transport,
            consumer,
            NetworkHealthProbe::from_config(config),
            ReconnectPolicy::from_config(config),
        )
        .with_latency_capacity(config.latency_capacity)
        .with_idle_timeout(config.idle_timeout())
        .with_reprobe_on_reconnect(config.reprobe_on_reconnect)
    }

    pub fn with_metrics(mut self, metrics: FeedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_latency_capacity(mut self, capacity: usize) -> Self {
        self.latency = LatencyTracker::new(capacity);
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_reprobe_on_reconnect(mut self, reprobe: bool) -> Self {
        self.reprobe_on_reconnect = reprobe;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            running: Arc::clone(&self.running),
            control: self.control_tx.clone(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Most recent status emitted, if any
    pub fn last_status(&self) -> Option<&ConnectionStatus> {
        self.last_status.as_ref()
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn probe(&self) -> &NetworkHealthProbe {
        &self.probe
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Stop at the next check point; idempotent
    pub fn stop(&self) {
        info!("Stopping stream session");
        self.running.send_replace(false);
    }

    /// Forwarded to the health probe; applies from the next probe on
    pub fn set_manual_tunnel_override(&mut self, manual_override: Option<bool>) {
        self.probe.set_manual_override(manual_override);
    }

    /// Reset the reconnect budget and start again
    pub async fn request_reconnect(&mut self) -> SessionState {
        info!(state = ?self.state, "Manual reconnect requested");
        self.policy.reset();
        self.start().await
    }

    /// Start the session and keep it alive, restarting from `Terminated`
    /// whenever a reconnect is requested through a handle. Returns once stopped.
    pub async fn run(&mut self) -> SessionState {
        let mut state = self.start().await;

        while state.is_terminated() {
            if !self.wait_for_reconnect().await {
                break;
            }
            state = self.request_reconnect().await;
        }

        info!(state = ?state, "Stream session finished");
        state
    }

    /// Run one lifecycle until the session is stopped or terminated.
    ///
    /// Returns `Idle` straight away if the session was stopped and not resumed.
    pub async fn start(&mut self) -> SessionState {
        self.running_rx.borrow_and_update();

        let mut needs_probe = true;

        loop {
            self.apply_pending_controls();
            if !self.is_running() {
                return self.halt().await;
            }

            self.transition(SessionState::Probing);
            if needs_probe {
                let report = self.probe.check().await;
                if !report.internet_connected {
                    error!("No internet connection available");
                    self.emit(ConnectionStatus::NoInternet);
                    return self.terminate().await;
                }
                if !report.tunnel_detected {
                    warn!("Tunnel not detected, connection to exchange may fail");
                    self.emit(ConnectionStatus::VpnNotDetected);
                }
                if !self.is_running() {
                    return self.halt().await;
                }
            }

            self.transition(SessionState::Connecting);
            self.emit(ConnectionStatus::Connecting);

            let reason = match self.transport.connect().await {
                Ok(()) => {
                    self.policy.record_success();
                    self.transition(SessionState::Streaming);
                    self.set_connected(true);
                    self.emit(ConnectionStatus::Connected);

                    match self.stream().await {
                        StreamExit::Stopped => return self.halt().await,
                        StreamExit::Closed(reason) => reason,
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to feed");
                    CloseReason::Error(e.to_string())
                }
            };

            self.set_connected(false);
            self.transport.close().await;
            warn!(reason = %reason, "Feed connection lost");
            self.transition(SessionState::Closed(reason.clone()));
            self.emit(ConnectionStatus::Disconnected(reason.to_string()));

            self.policy.record_failure();
            if !self.policy.should_retry() {
                error!(
                    attempts = self.policy.attempt_count(),
                    "Maximum reconnection attempts reached, giving up"
                );
                self.emit(ConnectionStatus::ReconnectFailed);
                return self.terminate().await;
            }

            if let Some(metrics) = &self.metrics {
                metrics.reconnect_attempts.inc();
            }
            let delay = self.policy.delay();
            info!(
                attempt = self.policy.attempt_count(),
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after delay"
            );
            self.emit(ConnectionStatus::Reconnecting {
                attempt: self.policy.attempt_count(),
                max_attempts: self.policy.max_attempts(),
            });

            if !self.wait(delay).await {
                return self.halt().await;
            }
            needs_probe = self.reprobe_on_reconnect;
        }
    }

    /// Receive loop; returns when the connection ends or a stop is requested
    async fn stream(&mut self) -> StreamExit {
        // Set once a keepalive went out and cleared by any frame
        let mut keepalive_pending = false;

        loop {
            self.apply_pending_controls();
            if !self.is_running() {
                return StreamExit::Stopped;
            }

            let wake = tokio::select! {
                biased;
                _ = self.running_rx.changed() => Wake::Flag,
                Some(control) = self.control_rx.recv() => Wake::Control(control),
                frame = timeout(self.idle_timeout, self.transport.recv()) => Wake::Frame(frame),
            };

            match wake {
                Wake::Flag => {}
                Wake::Control(control) => self.apply_control(control),
                Wake::Frame(Ok(Ok(Some(text)))) => {
                    keepalive_pending = false;
                    self.process_message(&text);
                }
                Wake::Frame(Ok(Ok(None))) => keepalive_pending = false,
                Wake::Frame(Ok(Err(FeedError::Closed(reason)))) => {
                    return StreamExit::Closed(CloseReason::Normal(reason));
                }
                Wake::Frame(Ok(Err(e))) => {
                    return StreamExit::Closed(CloseReason::Error(e.to_string()));
                }
                Wake::Frame(Err(_)) if keepalive_pending => {
                    warn!(
                        idle_ms = self.idle_timeout.as_millis() as u64,
                        "Keepalive went unanswered, closing connection"
                    );
                    return StreamExit::Closed(CloseReason::Error(format!(
                        "stale connection: no frame within {}ms of keepalive",
                        self.idle_timeout.as_millis()
                    )));
                }
                Wake::Frame(Err(_)) => {
                    warn!(
                        idle_ms = self.idle_timeout.as_millis() as u64,
                        "No message received within idle timeout, sending keepalive"
                    );
                    if let Err(e) = self.transport.ping().await {
                        warn!(error = %e, "Keepalive ping failed");
                        return StreamExit::Closed(CloseReason::Error(format!(
                            "stale connection: {}",
                            e
                        )));
                    }
                    keepalive_pending = true;
                }
            }
        }
    }

    /// Parse one raw message and hand the snapshot to the consumer.
    ///
    /// A malformed message is logged and dropped; it never ends the session.
    fn process_message(&mut self, raw: &str) {
        let started = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.messages_received.inc();
        }

        match parse_snapshot(raw) {
            Ok(snapshot) => {
                trace!(
                    symbol = %snapshot.symbol(),
                    asks = snapshot.asks().len(),
                    bids = snapshot.bids().len(),
                    "Delivering snapshot"
                );
                self.consumer.on_snapshot(snapshot);
                if let Some(metrics) = &self.metrics {
                    metrics.snapshots_delivered.inc();
                }
            }
            Err(e) => {
                warn!(error = %e, len = raw.len(), "Dropping malformed feed message");
                if let Some(metrics) = &self.metrics {
                    metrics.messages_dropped.inc();
                }
            }
        }

        let elapsed = started.elapsed();
        self.latency.record(elapsed);
        if let Some(metrics) = &self.metrics {
            metrics.processing_seconds.observe(elapsed.as_secs_f64());
        }
    }

    /// Sleep for `delay`; returns false if stopped meanwhile
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        while self.is_running() {
            let control = tokio::select! {
                biased;
                _ = self.running_rx.changed() => None,
                _ = &mut sleep => break,
                Some(control) = self.control_rx.recv() => Some(control),
            };

            if let Some(control) = control {
                self.apply_control(control);
            }
        }

        self.is_running()
    }

    /// Park while terminated; true once a reconnect is requested, false on stop
    async fn wait_for_reconnect(&mut self) -> bool {
        loop {
            if !self.is_running() {
                return false;
            }

            let control = tokio::select! {
                biased;
                _ = self.running_rx.changed() => None,
                Some(control) = self.control_rx.recv() => Some(control),
            };

            match control {
                // A stop sent alongside the request wins
                Some(Control::Reconnect) => return self.is_running(),
                Some(other) => self.apply_control(other),
                None => {}
            }
        }
    }

    fn apply_pending_controls(&mut self) {
        while let Ok(control) = self.control_rx.try_recv() {
            self.apply_control(control);
        }
    }

    fn apply_control(&mut self, control: Control) {
        match control {
            Control::TunnelOverride(manual_override) => {
                self.probe.set_manual_override(manual_override);
            }
            Control::Reconnect => {
                // Already live: only the attempt budget is refreshed
                info!(state = ?self.state, "Reconnect requested, resetting attempt budget");
                self.policy.reset();
            }
        }
    }

    async fn halt(&mut self) -> SessionState {
        self.set_connected(false);
        self.transport.close().await;
        self.transition(SessionState::Idle);
        info!("Stream session stopped");
        SessionState::Idle
    }

    async fn terminate(&mut self) -> SessionState {
        self.set_connected(false);
        self.transport.close().await;
        self.transition(SessionState::Terminated);
        SessionState::Terminated
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state transition");
        self.state = next;
    }

    fn emit(&mut self, status: ConnectionStatus) {
        info!(status = %status, "Connection status changed");
        self.last_status = Some(status.clone());
        self.consumer.on_status(status);
    }

    fn set_connected(&self, connected: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.connected.set(i64::from(connected));
        }
    }
}
