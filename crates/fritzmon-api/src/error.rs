use std::io;

use thiserror::Error;

use crate::callmonitor::ProtocolError;

/// Top-level error type for the `fritzmon-api` crate.
///
/// Covers every failure mode across both router surfaces:
/// the call-monitor TCP feed and the AHA home-automation HTTP interface.
/// `fritzmon-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, login blocked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Session id was rejected by the router (HTTP 403 or zero SID).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── AHA webservice ──────────────────────────────────────────────
    /// Non-success response from the home-automation webservice.
    #[error("Router API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Call monitor ────────────────────────────────────────────────
    /// Could not open or keep the call-monitor TCP connection.
    #[error("Call monitor connection to {host}:{port} failed ({failure}): {source}")]
    Connect {
        host: String,
        port: u16,
        failure: ConnectFailure,
        #[source]
        source: io::Error,
    },

    /// Malformed call-monitor stream.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // ── Data ────────────────────────────────────────────────────────
    /// XML deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-registration might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Connect { .. } => true,
            _ => false,
        }
    }

    /// Build a classified [`Error::Connect`] from a socket error.
    pub fn connect(host: &str, port: u16, source: io::Error) -> Self {
        Self::Connect {
            host: host.to_owned(),
            port,
            failure: ConnectFailure::classify(&source),
            source,
        }
    }
}

/// Coarse classification of call-monitor socket failures.
///
/// Each class carries an actionable hint for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectFailure {
    /// The router answered but nothing listens on the port.
    Refused,
    /// DNS resolution failed.
    HostNotFound,
    /// No route to the configured address.
    Unreachable,
    /// The peer dropped an established connection.
    Reset,
    TimedOut,
    Other,
}

impl ConnectFailure {
    /// Map an `io::Error` onto a failure class.
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::NotFound => Self::HostNotFound,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::Unreachable
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::Reset,
            io::ErrorKind::TimedOut => Self::TimedOut,
            _ if looks_like_dns_failure(err) => Self::HostNotFound,
            _ => Self::Other,
        }
    }

    /// Operator-facing hint for this failure class.
    pub fn hint(self) -> &'static str {
        match self {
            Self::Refused => {
                "is the call monitor enabled on the router? Dial #96*5* to switch it on"
            }
            Self::HostNotFound | Self::Unreachable => "check the configured router address",
            Self::Reset => "the router closed the connection; it will be re-established",
            Self::TimedOut => "the router did not answer in time; check network connectivity",
            Self::Other => "unexpected socket error",
        }
    }
}

/// `tokio::net::lookup_host` surfaces resolver failures as `Other`
/// with a message mentioning the lookup.
fn looks_like_dns_failure(err: &io::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("failed to lookup address")
        || msg.contains("name or service not known")
        || msg.contains("no such host")
        || msg.contains("nodename nor servname")
}
