// ── Call domain types ──

use chrono::NaiveDateTime;
use fritzmon_api::CallDuration;
use serde::{Deserialize, Serialize};

/// Who started the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Phase of the call in flight. No session at all means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallPhase {
    Ringing,
    Dialing,
    Answered,
}

/// The call currently tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSession {
    pub connection_id: Option<String>,
    pub remote_number: Option<String>,
    pub direction: CallDirection,
    pub phase: CallPhase,
    pub started_at: NaiveDateTime,
}

impl CallSession {
    pub fn answered(&self) -> bool {
        self.phase == CallPhase::Answered
    }
}

/// Named events handed to automation listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallEventName {
    IncomingCall,
    OutgoingCall,
    CallAnswered,
    CallDisconnected,
    MissedCall,
}

/// Payload of one emitted call event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallNotification {
    pub name: CallEventName,
    pub connection_id: Option<String>,
    pub remote_number: Option<String>,
    /// Phonebook name, or the unknown-caller label.
    pub resolved_name: String,
    pub timestamp: NaiveDateTime,
    /// Only on `CallDisconnected`.
    pub duration: Option<CallDuration>,
}

impl CallNotification {
    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration.as_ref().and_then(CallDuration::seconds)
    }
}
