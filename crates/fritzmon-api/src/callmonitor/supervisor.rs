//! Call-monitor connection supervisor with auto-reconnect.
//!
//! Keeps one TCP connection to the router's call-monitor port open,
//! frames and parses every line it receives, and forwards the parsed
//! [`CallEvent`]s through a bounded [`tokio::sync::mpsc`] channel in wire
//! order. Socket failures are classified, logged with a hint, and retried
//! with exponential backoff + jitter; nothing here ends the process.
//!
//! # Example
//!
//! ```rust,ignore
//! use fritzmon_api::callmonitor::{MonitorConfig, MonitorHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let (handle, mut events) = MonitorHandle::spawn(MonitorConfig::new("fritz.box"), cancel);
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} from {:?}", event.kind.as_str(), event.remote_number);
//! }
//!
//! handle.shutdown().await;
//! ```

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::framer::{DEFAULT_MAX_LINE_LENGTH, LineFramer};
use super::parser::{CallEvent, parse_line};
use crate::error::Error;

// ── Channel capacity ─────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;
const READ_BUFFER_SIZE: usize = 1024;

/// Port the router's call monitor listens on once enabled (`#96*5*`).
pub const DEFAULT_MONITOR_PORT: u16 = 1012;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for call-monitor reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

// ── MonitorConfig ────────────────────────────────────────────────────

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub host: String,
    pub port: u16,
    pub reconnect: ReconnectConfig,
    pub connect_timeout: Duration,
    /// Cap on buffered unterminated data; see [`LineFramer`].
    pub max_line_length: usize,
}

impl MonitorConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MONITOR_PORT,
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the call-monitor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the backoff before attempt number `attempt`.
    Reconnecting { attempt: u32 },
}

// ── MonitorHandle ────────────────────────────────────────────────────

/// Handle to a running call-monitor task.
///
/// Dropping the event receiver stops the task after the current line.
pub struct MonitorHandle {
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Spawn the supervisor loop.
    ///
    /// Returns immediately; the first connection attempt happens on the
    /// background task. Events arrive on the returned receiver.
    pub fn spawn(
        config: MonitorConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<CallEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            monitor_loop(config, event_tx, state_tx, task_cancel).await;
        });

        (
            Self {
                state_rx,
                cancel,
                task,
            },
            event_rx,
        )
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the task and wait until the socket has been closed.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "call monitor task did not exit cleanly");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection ended without a socket error.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// The router closed the stream.
    Closed,
    Cancelled,
    /// Nobody is listening for events any more.
    ReceiverDropped,
}

/// Main loop: connect → read → on error, backoff → reconnect.
async fn monitor_loop(
    config: MonitorConfig,
    event_tx: mpsc::Sender<CallEvent>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut framer = LineFramer::new(config.max_line_length);
    let mut attempt: u32 = 0;

    loop {
        state_tx.send_replace(ConnectionState::Connecting);
        let result = match connect(&config, &cancel).await {
            Ok(Some(mut stream)) => {
                // Backoff restarts from the initial delay once connected.
                attempt = 0;
                framer.reset();
                state_tx.send_replace(ConnectionState::Connected);
                tracing::info!(host = %config.host, port = config.port, "call monitor connected");

                let end = read_lines(&config, &mut stream, &mut framer, &event_tx, &cancel).await;
                close_stream(&mut stream).await;
                end
            }
            Ok(None) => Ok(SessionEnd::Cancelled),
            Err(e) => Err(e),
        };
        state_tx.send_replace(ConnectionState::Disconnected);

        match result {
            Ok(SessionEnd::Cancelled | SessionEnd::ReceiverDropped) => break,
            // The router ended the stream; start over with a short pause.
            Ok(SessionEnd::Closed) => {
                tracing::info!(host = %config.host, "call monitor closed by router, reconnecting");
            }
            Err(e) => {
                log_connection_error(&e, attempt);

                if let Some(max) = config.reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "call monitor reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
            }
        }

        let delay = calculate_backoff(attempt, &config.reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        state_tx.send_replace(ConnectionState::Reconnecting { attempt });

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    tracing::debug!("call monitor loop exiting");
}

fn log_connection_error(err: &Error, attempt: u32) {
    match err {
        Error::Connect {
            host,
            port,
            failure,
            source,
        } => tracing::error!(
            host = %host,
            port,
            failure = %failure,
            error = %source,
            attempt,
            hint = failure.hint(),
            "call monitor connection failed"
        ),
        other => tracing::warn!(error = %other, attempt, "call monitor error"),
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one connection. `None` means the token fired first.
async fn connect(
    config: &MonitorConfig,
    cancel: &CancellationToken,
) -> Result<Option<TcpStream>, Error> {
    tracing::info!(host = %config.host, port = config.port, "connecting to call monitor");

    let connect = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect((config.host.as_str(), config.port)),
    );
    tokio::select! {
        biased;
        () = cancel.cancelled() => Ok(None),
        result = connect => match result {
            Ok(Ok(stream)) => Ok(Some(stream)),
            Ok(Err(e)) => Err(Error::connect(&config.host, config.port, e)),
            Err(_) => Err(Error::connect(
                &config.host,
                config.port,
                io::Error::from(io::ErrorKind::TimedOut),
            )),
        },
    }
}

/// Pump lines from a connected stream until it ends.
///
/// The caller closes the stream afterwards via [`close_stream`], so the
/// socket is flushed and shut down before it retries or exits.
async fn read_lines(
    config: &MonitorConfig,
    stream: &mut TcpStream,
    framer: &mut LineFramer,
    event_tx: &mpsc::Sender<CallEvent>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, Error> {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            read = stream.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => return Ok(SessionEnd::Closed),
            Ok(n) => n,
            Err(e) => return Err(Error::connect(&config.host, config.port, e)),
        };

        if dispatch_lines(framer, &buf[..n], event_tx).await.is_err() {
            return Ok(SessionEnd::ReceiverDropped);
        }
    }
}

/// Frame, parse and forward everything completed by `chunk`, in order.
///
/// Errs only when the event receiver is gone.
async fn dispatch_lines(
    framer: &mut LineFramer,
    chunk: &[u8],
    event_tx: &mpsc::Sender<CallEvent>,
) -> Result<(), mpsc::error::SendError<CallEvent>> {
    for item in framer.feed(chunk) {
        match item {
            Ok(line) => {
                tracing::debug!(line = %line, "call monitor line");
                if line.trim().is_empty() {
                    continue;
                }
                event_tx.send(parse_line(&line)).await?;
            }
            Err(e) => tracing::warn!(error = %e, "discarding malformed call monitor data"),
        }
    }
    Ok(())
}

async fn close_stream(stream: &mut TcpStream) {
    if let Err(e) = stream.flush().await {
        tracing::debug!(error = %e, "flush before close failed");
    }
    if let Err(e) = stream.shutdown().await {
        tracing::debug!(error = %e, "socket shutdown failed");
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25%, derived from the attempt number.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::callmonitor::CallEventKind;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn default_monitor_config_uses_call_monitor_port() {
        let config = MonitorConfig::new("fritz.box");
        assert_eq!(config.port, 1012);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        for attempt in [10, 31, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            assert!(
                delay <= Duration::from_millis(12_500),
                "delay at attempt {attempt} ({delay:?}) should be capped near max_delay"
            );
        }
    }

    #[tokio::test]
    async fn dispatch_preserves_wire_order_across_chunks() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut framer = LineFramer::default();

        dispatch_lines(
            &mut framer,
            b"22.09.16 19:03:31;RING;0;555;123;SIP0;\n22.09.16 19:03:40;CON",
            &tx,
        )
        .await
        .unwrap();
        dispatch_lines(&mut framer, b"NECT;0;12;555;\n\n", &tx)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, CallEventKind::Ring);
        assert_eq!(rx.recv().await.unwrap().kind, CallEventKind::Connect);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let mut framer = LineFramer::default();
        let result = dispatch_lines(&mut framer, b"x;RING;0;1;2;\n", &tx).await;
        assert!(result.is_err());
    }
}
