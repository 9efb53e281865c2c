// ── Runtime hub configuration ──
//
// These types describe *how* to reach the router. They carry credential
// data and tuning, but never touch disk: the CLI builds a `HubConfig`
// and hands it in.

use std::time::Duration;

use fritzmon_api::callmonitor::{DEFAULT_MAX_LINE_LENGTH, DEFAULT_MONITOR_PORT, MonitorConfig};
use fritzmon_api::{Credentials, ReconnectConfig, TlsMode, TransportConfig};
use url::Url;

/// Label used when the phonebook has no entry for a number.
pub const DEFAULT_UNKNOWN_LABEL: &str = "unknown";

/// TLS verification strategy for the router's web interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs). Default for home routers.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for one router.
///
/// Built by the CLI, passed to [`Hub`](crate::Hub): core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Router web root (e.g., `http://fritz.box`).
    pub url: Url,
    /// Call-monitor host; usually the router's address.
    pub monitor_host: String,
    pub monitor_port: u16,
    /// Credentials for the home-automation interface. When `None`, the
    /// credential store is consulted.
    pub credentials: Option<Credentials>,
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Device poll interval.
    pub poll_interval: Duration,
    /// Upper bound for one device's detail fetch.
    pub device_fetch_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// Cap on buffered unterminated call-monitor data.
    pub max_line_length: usize,
    /// Name reported for callers the phonebook does not know.
    pub unknown_caller_label: String,
    pub call_monitor_enabled: bool,
    pub device_polling_enabled: bool,
}

impl HubConfig {
    /// Defaults for a router at `url`; the call monitor host follows the URL.
    pub fn new(url: Url) -> Self {
        let monitor_host = url.host_str().unwrap_or("fritz.box").to_owned();
        Self {
            url,
            monitor_host,
            monitor_port: DEFAULT_MONITOR_PORT,
            credentials: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            device_fetch_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            unknown_caller_label: DEFAULT_UNKNOWN_LABEL.to_owned(),
            call_monitor_enabled: true,
            device_polling_enabled: true,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }

    pub(crate) fn monitor(&self) -> MonitorConfig {
        let mut monitor = MonitorConfig::new(self.monitor_host.clone());
        monitor.port = self.monitor_port;
        monitor.reconnect = self.reconnect.clone();
        monitor.max_line_length = self.max_line_length;
        monitor
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_url() {
        let config = HubConfig::new(Url::parse("http://192.168.178.1").unwrap());
        assert_eq!(config.monitor_host, "192.168.178.1");
        assert_eq!(config.monitor_port, 1012);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.unknown_caller_label, "unknown");
        assert!(config.call_monitor_enabled && config.device_polling_enabled);
    }

    #[test]
    fn monitor_config_carries_tuning() {
        let mut config = HubConfig::new(Url::parse("http://fritz.box").unwrap());
        config.monitor_port = 2012;
        config.max_line_length = 128;
        let monitor = config.monitor();
        assert_eq!(monitor.host, "fritz.box");
        assert_eq!(monitor.port, 2012);
        assert_eq!(monitor.max_line_length, 128);
    }
}
