//! WebSocket client for the push content channel.
//!
//! Features:
//! - Automatic reconnection with exponential backoff
//! - Staleness detection from the heartbeat interval
//! - Session announcements surfaced alongside content

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{stream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::decoder::{decode_message, PushEvent};
use crate::error::PushError;
use crate::metrics;

/// Reconnection configuration for the push channel.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_s: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential).
    pub backoff_multiplier: f64,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_s: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_s: 30,
            backoff_multiplier: 2.0,
            heartbeat_interval_s: 30,
        }
    }
}

impl ReconnectConfig {
    /// Create from config values.
    pub fn from_config(max_delay_s: u64, heartbeat_interval_s: u64) -> Self {
        Self {
            max_delay_s,
            heartbeat_interval_s,
            ..Default::default()
        }
    }

    /// Delay before reconnect attempt `attempt`, capped at `max_delay_s`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let max_delay_ms = self.max_delay_s * 1000;
        Duration::from_millis(delay_ms.min(max_delay_ms as f64) as u64)
    }
}

/// Push channel connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and receiving.
    Connected,
    /// Waiting out a backoff delay.
    Reconnecting,
}

/// Long-lived push connection delivering decoded [`PushEvent`]s.
pub struct PushChannel {
    ws_url: String,
    reconnect_config: ReconnectConfig,
    state: Arc<RwLock<ConnectionState>>,
    connected: Arc<AtomicBool>,
    reconnect_attempts: Arc<AtomicU64>,
    last_message_time: Arc<RwLock<Option<Instant>>>,
}

impl PushChannel {
    /// Create a channel with default reconnection settings.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self::with_reconnect_config(ws_url, ReconnectConfig::default())
    }

    /// Create with custom reconnection config.
    pub fn with_reconnect_config(ws_url: impl Into<String>, config: ReconnectConfig) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect_config: config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            reconnect_attempts: Arc::new(AtomicU64::new(0)),
            last_message_time: Arc::new(RwLock::new(None)),
        }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Get reconnection attempt count.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// True when nothing arrived for two heartbeat intervals.
    pub fn is_stale(&self) -> bool {
        match *self.last_message_time.read() {
            Some(last) => {
                last.elapsed() > Duration::from_secs(self.reconnect_config.heartbeat_interval_s * 2)
            }
            None => false,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Connect once and stream decoded events until the socket closes.
    pub async fn run(&self) -> Result<impl futures::Stream<Item = PushEvent> + '_, PushError> {
        info!(url = %self.ws_url, "Connecting to push channel");
        self.set_state(ConnectionState::Connecting);

        let (ws_stream, _) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            self.set_state(ConnectionState::Disconnected);
            PushError::ConnectionFailed(e.to_string())
        })?;

        self.connected.store(true, Ordering::SeqCst);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);

        let (_write, read) = ws_stream.split();

        let connected = self.connected.clone();
        let state = self.state.clone();
        let last_msg_time = self.last_message_time.clone();

        let stream = read
            .filter_map(move |msg| {
                let connected = connected.clone();
                let state = state.clone();
                let last_msg_time = last_msg_time.clone();

                async move {
                    *last_msg_time.write() = Some(Instant::now());

                    match msg {
                        Ok(Message::Text(text)) => {
                            metrics::inc_push_messages_received();
                            Some(decode_message(&text))
                        }
                        Ok(Message::Ping(_)) => {
                            debug!("Received ping");
                            None
                        }
                        Ok(Message::Pong(_)) => {
                            debug!("Received pong");
                            None
                        }
                        Ok(Message::Close(frame)) => {
                            let closed = PushError::ConnectionClosed {
                                code: frame.as_ref().map(|f| u16::from(f.code)),
                                reason: frame
                                    .as_ref()
                                    .map(|f| f.reason.to_string())
                                    .unwrap_or_default(),
                            };
                            warn!(error = %closed, "Push channel closed");
                            connected.store(false, Ordering::SeqCst);
                            *state.write() = ConnectionState::Disconnected;
                            None
                        }
                        Ok(_) => None,
                        Err(e) => {
                            error!(error = %PushError::from(e), "Push channel error");
                            connected.store(false, Ordering::SeqCst);
                            *state.write() = ConnectionState::Disconnected;
                            None
                        }
                    }
                }
            })
            .flat_map(stream::iter);

        Ok(stream)
    }

    /// Run with automatic reconnection on disconnect.
    ///
    /// Returns a receiver of decoded events; dropping it stops the channel.
    pub fn run_with_reconnect(self: Arc<Self>) -> mpsc::Receiver<PushEvent> {
        let (tx, rx) = mpsc::channel(1000);
        let channel = self;

        tokio::spawn(async move {
            let mut attempt = 0u32;

            loop {
                info!(attempt = attempt, "Attempting push connection");

                match channel.run().await {
                    Ok(events) => {
                        attempt = 0;
                        let mut events = Box::pin(events);

                        while let Some(event) = events.next().await {
                            if tx.send(event).await.is_err() {
                                info!("Receiver dropped, stopping push channel");
                                return;
                            }
                        }

                        channel.connected.store(false, Ordering::SeqCst);
                        warn!("Push stream ended, will reconnect");
                    }
                    Err(e) => {
                        error!(error = %e, attempt = attempt, "Push connection failed");
                    }
                }

                if tx.is_closed() {
                    return;
                }

                let delay = channel.reconnect_config.next_delay(attempt);
                channel.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
                channel.set_state(ConnectionState::Reconnecting);
                metrics::inc_push_reconnects();

                info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
                tokio::time::sleep(delay).await;

                attempt = attempt.saturating_add(1);
            }
        });

        rx
    }
}
