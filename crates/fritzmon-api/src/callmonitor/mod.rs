// Call monitor: the router's line-based TCP feed of call lifecycle events.
//
// `supervisor` owns the connection, `framer` cuts the byte stream into
// lines, `parser` turns each line into a `CallEvent`.

pub mod framer;
pub mod parser;
pub mod supervisor;

pub use framer::{DEFAULT_MAX_LINE_LENGTH, LineFramer, ProtocolError};
pub use parser::{CallDuration, CallEvent, CallEventKind, TIMESTAMP_FORMAT, parse_line};
pub use supervisor::{
    ConnectionState, DEFAULT_MONITOR_PORT, MonitorConfig, MonitorHandle, ReconnectConfig,
    calculate_backoff,
};
