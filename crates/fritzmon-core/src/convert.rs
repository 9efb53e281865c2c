// ── API-to-domain conversions ──
//
// Bridges raw `fritzmon_api` device XML into `DeviceSnapshot`. Numeric
// fields arrive as strings; anything missing or unparsable becomes 0
// rather than failing the poll cycle.

use chrono::Utc;

use fritzmon_api::AhaDevice;

use crate::model::{
    DeviceKind, DeviceSnapshot, DeviceState, SocketState, ThermostatState, unique_id,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse `raw` and divide by `divisor`; 0 when absent or not a number.
fn scaled(raw: Option<&str>, divisor: f64) -> f64 {
    raw.map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map_or(0.0, |v| v / divisor)
}

/// Thermostat half-degree encoding for "valve forced off".
const HKR_OFF: &str = "253";
/// Thermostat half-degree encoding for "valve forced on".
const HKR_ON: &str = "254";

fn half_degrees(raw: Option<&str>) -> Option<f64> {
    match raw.map(str::trim) {
        Some(HKR_OFF | HKR_ON) => None,
        other => Some(scaled(other, 2.0)),
    }
}

// ── State normalization ────────────────────────────────────────────

/// mW → W, Wh → kWh, deci-°C → °C.
pub fn socket_state(device: &AhaDevice) -> SocketState {
    let switch_state = device.switch.as_ref().and_then(|s| s.state.as_deref());
    let meter = device.powermeter.as_ref();
    let celsius = device.temperature.as_ref().and_then(|t| t.celsius.as_deref());

    SocketState {
        onoff: switch_state.map(str::trim) == Some("1"),
        power_w: scaled(meter.and_then(|m| m.power.as_deref()), 1000.0),
        energy_kwh: scaled(meter.and_then(|m| m.energy.as_deref()), 1000.0),
        temperature_c: scaled(celsius, 10.0),
    }
}

pub fn thermostat_state(device: &AhaDevice) -> ThermostatState {
    let hkr = device.hkr.as_ref();
    ThermostatState {
        measured_c: scaled(hkr.and_then(|h| h.tist.as_deref()), 2.0),
        target_c: half_degrees(hkr.and_then(|h| h.tsoll.as_deref())),
    }
}

/// Build the next snapshot for `device`.
///
/// A present device gets freshly normalized state. An absent one only
/// refreshes its identity fields and keeps whatever state `previous`
/// carried, so consumers can still show the last known readings.
pub fn reconcile(
    previous: Option<&DeviceSnapshot>,
    device: &AhaDevice,
    kind: DeviceKind,
) -> DeviceSnapshot {
    let present = device.is_present();
    let state = if present {
        Some(match kind {
            DeviceKind::Socket => DeviceState::Socket(socket_state(device)),
            DeviceKind::Thermostat => DeviceState::Thermostat(thermostat_state(device)),
        })
    } else {
        previous.and_then(|p| p.state)
    };

    DeviceSnapshot {
        id: device.identifier.clone(),
        unique_id: unique_id(&device.identifier),
        kind,
        name: device.name.clone(),
        model: device.product_name.clone(),
        manufacturer: device.manufacturer.clone(),
        firmware: device.fw_version.clone(),
        present,
        state,
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use fritzmon_api::aha::{HkrInfo, PowerMeter, SwitchInfo, TemperatureInfo};

    use super::*;

    fn plug(present: &str, power: &str, energy: &str, celsius: &str) -> AhaDevice {
        AhaDevice {
            identifier: "08761 0000434".into(),
            manufacturer: Some("AVM".into()),
            product_name: Some("FRITZ!DECT 200".into()),
            present: Some(present.into()),
            name: Some("Kaffee".into()),
            switch: Some(SwitchInfo {
                state: Some("1".into()),
                ..SwitchInfo::default()
            }),
            powermeter: Some(PowerMeter {
                power: Some(power.into()),
                energy: Some(energy.into()),
                voltage: None,
            }),
            temperature: Some(TemperatureInfo {
                celsius: Some(celsius.into()),
                offset: None,
            }),
            ..AhaDevice::default()
        }
    }

    #[test]
    fn socket_units_are_normalized() {
        let snap = reconcile(None, &plug("1", "12340", "707", "285"), DeviceKind::Socket);
        let state = snap.socket().unwrap();
        assert!(state.onoff);
        assert_eq!(state.power_w, 12.34);
        assert_eq!(state.energy_kwh, 0.707);
        assert_eq!(state.temperature_c, 28.5);
        assert_eq!(snap.unique_id, "087610000434");
        assert_eq!(snap.model.as_deref(), Some("FRITZ!DECT 200"));
    }

    #[test]
    fn unparsable_numbers_become_zero() {
        let snap = reconcile(None, &plug("1", "n/a", "", "warm"), DeviceKind::Socket);
        let state = snap.socket().unwrap();
        assert_eq!(state.power_w, 0.0);
        assert_eq!(state.energy_kwh, 0.0);
        assert_eq!(state.temperature_c, 0.0);
    }

    #[test]
    fn absent_device_keeps_previous_readings() {
        let before = reconcile(None, &plug("1", "5000", "1000", "200"), DeviceKind::Socket);
        // Router reports zeros/blanks for an unreachable plug.
        let after = reconcile(Some(&before), &plug("0", "", "", ""), DeviceKind::Socket);

        assert!(!after.present);
        assert_eq!(after.state, before.state);
        assert_eq!(after.socket().unwrap().power_w, 5.0);
    }

    #[test]
    fn absent_device_never_seen_has_no_state() {
        let snap = reconcile(None, &plug("0", "", "", ""), DeviceKind::Socket);
        assert!(!snap.present);
        assert!(snap.state.is_none());
        assert_eq!(snap.name.as_deref(), Some("Kaffee"));
    }

    #[test]
    fn thermostat_half_degrees_and_forced_states() {
        let mut device = AhaDevice {
            identifier: "11960 0089208".into(),
            present: Some("1".into()),
            hkr: Some(HkrInfo {
                tist: Some("41".into()),
                tsoll: Some("44".into()),
            }),
            ..AhaDevice::default()
        };
        let snap = reconcile(None, &device, DeviceKind::Thermostat);
        let state = snap.thermostat().unwrap();
        assert_eq!(state.measured_c, 20.5);
        assert_eq!(state.target_c, Some(22.0));

        device.hkr.as_mut().unwrap().tsoll = Some("253".into());
        let snap = reconcile(None, &device, DeviceKind::Thermostat);
        assert_eq!(snap.thermostat().unwrap().target_c, None);
    }
}
