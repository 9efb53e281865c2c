// fritzmon-api: Async Rust client for the FRITZ!Box call monitor and AHA webservice

pub mod aha;
pub mod auth;
pub mod callmonitor;
pub mod error;
pub mod transport;

pub use aha::{AhaClient, AhaDevice};
pub use auth::{Credentials, SessionId};
pub use callmonitor::{
    CallDuration, CallEvent, CallEventKind, ConnectionState, LineFramer, MonitorConfig,
    MonitorHandle, ProtocolError, ReconnectConfig, parse_line,
};
pub use error::{ConnectFailure, Error};
pub use transport::{TlsMode, TransportConfig};
