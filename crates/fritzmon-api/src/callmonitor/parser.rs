// ── Call-monitor line grammar ──
//
//   <dd.mm.yy HH:MM:SS>;RING;<conn>;<remote>;<local>;[<device>];
//   <dd.mm.yy HH:MM:SS>;CALL;<conn>;<line>;<local>;<remote>;[<device>];
//   <dd.mm.yy HH:MM:SS>;CONNECT;<conn>;<line>;<remote>;
//   <dd.mm.yy HH:MM:SS>;DISCONNECT;<conn>;<duration>;
//
// Parsing never fails. Short lines leave the trailing fields `None`,
// unknown kinds come back as `CallEventKind::Unknown`.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Timestamp layout the router uses on every line.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// Line kind, the second field of every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEventKind {
    /// Incoming call is ringing.
    Ring,
    /// Outgoing call is being dialled.
    Call,
    Connect,
    Disconnect,
    /// Anything else, with the kind field as received.
    Unknown(String),
}

impl CallEventKind {
    fn from_field(field: &str) -> Self {
        match field {
            "RING" => Self::Ring,
            "CALL" => Self::Call,
            "CONNECT" => Self::Connect,
            "DISCONNECT" => Self::Disconnect,
            other => Self::Unknown(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ring => "RING",
            Self::Call => "CALL",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Unknown(raw) => raw,
        }
    }
}

/// Duration field of a `DISCONNECT` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CallDuration {
    Seconds(u64),
    /// Non-numeric content, passed through untouched.
    Raw(String),
}

impl CallDuration {
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Self::Seconds(s) => Some(*s),
            Self::Raw(_) => None,
        }
    }
}

/// One parsed call-monitor line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEvent {
    /// Router-local wall clock time; `None` when the date field is malformed.
    pub timestamp: Option<NaiveDateTime>,
    pub raw_timestamp: String,
    pub kind: CallEventKind,
    pub connection_id: Option<String>,
    /// Extension / line the router used (`CALL`, `CONNECT`).
    pub line: Option<String>,
    pub local_number: Option<String>,
    pub remote_number: Option<String>,
    /// Outgoing trunk, e.g. `SIP0`.
    pub device: Option<String>,
    pub duration: Option<CallDuration>,
    /// All fields as split, trailing empty field removed.
    pub raw_fields: Vec<String>,
}

/// Parse one line (without its terminator).
pub fn parse_line(line: &str) -> CallEvent {
    let mut raw_fields: Vec<String> = line.split(';').map(str::to_owned).collect();
    // Every line ends with `;`, which yields one empty trailing field.
    if raw_fields.len() > 1 && raw_fields.last().is_some_and(String::is_empty) {
        raw_fields.pop();
    }

    let field = |idx: usize| -> Option<String> {
        raw_fields
            .get(idx)
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_owned)
    };

    let raw_timestamp = raw_fields.first().map(|f| f.trim().to_owned()).unwrap_or_default();
    let timestamp = NaiveDateTime::parse_from_str(&raw_timestamp, TIMESTAMP_FORMAT).ok();
    let kind = CallEventKind::from_field(raw_fields.get(1).map_or("", |f| f.trim()));

    let mut event = CallEvent {
        timestamp,
        raw_timestamp,
        kind,
        connection_id: field(2),
        line: None,
        local_number: None,
        remote_number: None,
        device: None,
        duration: None,
        raw_fields: Vec::new(),
    };

    match event.kind {
        CallEventKind::Ring => {
            event.remote_number = field(3);
            event.local_number = field(4);
            event.device = field(5);
        }
        CallEventKind::Call => {
            event.line = field(3);
            event.local_number = field(4);
            event.remote_number = field(5);
            event.device = field(6);
        }
        CallEventKind::Connect => {
            event.line = field(3);
            event.remote_number = field(4);
        }
        CallEventKind::Disconnect => {
            event.duration = field(3).map(|raw| match raw.parse::<u64>() {
                Ok(secs) => CallDuration::Seconds(secs),
                Err(_) => CallDuration::Raw(raw),
            });
        }
        CallEventKind::Unknown(_) => {}
    }

    event.raw_fields = raw_fields;
    event
}
