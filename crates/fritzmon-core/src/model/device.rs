// ── Smart-home device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of device kinds the poller tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceKind {
    /// Switchable plug with power meter.
    Socket,
    /// Radiator controller.
    Thermostat,
}

/// Normalized socket readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SocketState {
    pub onoff: bool,
    pub power_w: f64,
    pub energy_kwh: f64,
    pub temperature_c: f64,
}

/// Normalized thermostat readings. `None` target means the valve is
/// forced fully off or on rather than regulating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermostatState {
    pub measured_c: f64,
    pub target_c: Option<f64>,
}

/// Per-kind state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceState {
    Socket(SocketState),
    Thermostat(ThermostatState),
}

/// One physical device as last seen by the poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Identifier as the router reports it (AIN, may contain spaces).
    pub id: String,
    /// `id` with all whitespace removed; the table key.
    pub unique_id: String,
    pub kind: DeviceKind,
    pub name: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub firmware: Option<String>,
    pub present: bool,
    /// Last readings taken while the device was present. Left untouched
    /// while it is absent; `None` if it was never seen present.
    pub state: Option<DeviceState>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceSnapshot {
    pub fn socket(&self) -> Option<&SocketState> {
        match &self.state {
            Some(DeviceState::Socket(s)) => Some(s),
            _ => None,
        }
    }

    pub fn thermostat(&self) -> Option<&ThermostatState> {
        match &self.state {
            Some(DeviceState::Thermostat(t)) => Some(t),
            _ => None,
        }
    }

    /// Display icon for the model.
    pub fn icon(&self) -> &'static str {
        match self.model.as_deref() {
            Some("FRITZ!DECT 210") => "FD210",
            _ => "FD200",
        }
    }
}

/// Normalize a router identifier into a table key.
pub fn unique_id(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
