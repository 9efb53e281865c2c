// ── Core error types ──
//
// User-facing errors from fritzmon-core. Consumers never see HTTP status
// codes or XML parse failures directly: the `From<fritzmon_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("No router credentials registered")]
    NoCredentials,

    #[error("Router request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Polling errors ───────────────────────────────────────────────
    /// The top-level device listing failed; the poll cycle was aborted.
    #[error("Device listing failed: {reason}")]
    ListingFetch { reason: String },

    /// One device's detail fetch failed; other devices are unaffected.
    #[error("Fetching device {unique_id} failed: {reason}")]
    DeviceFetch { unique_id: String, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Device {identifier} is unavailable: {reason}")]
    DeviceUnavailable { identifier: String, reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Router API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Auth-class failure: the session must be re-established.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::NoCredentials
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fritzmon_api::Error> for CoreError {
    fn from(err: fritzmon_api::Error) -> Self {
        match err {
            fritzmon_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            fritzmon_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-registration required".into(),
            },
            fritzmon_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        target: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            fritzmon_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            fritzmon_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            fritzmon_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                target: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            fritzmon_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            fritzmon_api::Error::Connect {
                host,
                port,
                failure,
                source,
            } => CoreError::ConnectionFailed {
                target: format!("{host}:{port}"),
                reason: format!("{source} ({})", failure.hint()),
            },
            fritzmon_api::Error::Protocol(e) => CoreError::Internal(e.to_string()),
            fritzmon_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expired_is_auth_class() {
        let err = CoreError::from(fritzmon_api::Error::SessionExpired);
        assert!(err.is_auth());
    }

    #[test]
    fn refused_connect_carries_hint() {
        let err = CoreError::from(fritzmon_api::Error::connect(
            "fritz.box",
            1012,
            std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        ));
        let text = err.to_string();
        assert!(text.contains("fritz.box:1012"), "{text}");
        assert!(text.contains("call monitor"), "{text}");
    }

    #[test]
    fn api_status_is_kept() {
        let err = CoreError::from(fritzmon_api::Error::Api {
            status: 500,
            message: "boom".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
        assert!(!err.is_auth());
    }
}
