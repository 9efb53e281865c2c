// Raw XML shapes returned by the router.
//
// Numeric content stays as `String`: the router sends empty elements for
// values it does not know yet, and normalization happens in the core.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// `<SessionInfo>` document from `/login_sid.lua`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename = "SessionInfo")]
pub struct SessionInfo {
    #[serde(rename = "SID")]
    pub sid: String,

    #[serde(rename = "Challenge", default)]
    pub challenge: String,

    /// Seconds the login is locked after failed attempts.
    #[serde(rename = "BlockTime", default)]
    pub block_time: Option<String>,
}

impl SessionInfo {
    pub fn block_time_secs(&self) -> u64 {
        self.block_time
            .as_deref()
            .and_then(|b| b.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// `<devicelist>` from `getdevicelistinfos`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename = "devicelist")]
pub struct DeviceList {
    #[serde(rename = "device", default)]
    pub devices: Vec<AhaDevice>,
}

/// One `<device>` element (also the root of `getdeviceinfos`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AhaDevice {
    /// AIN, usually with an embedded space: `"08761 0000434"`.
    #[serde(rename = "@identifier")]
    pub identifier: String,

    #[serde(rename = "@id", default)]
    pub id: Option<String>,

    #[serde(rename = "@functionbitmask", default)]
    pub function_bitmask: Option<String>,

    #[serde(rename = "@fwversion", default)]
    pub fw_version: Option<String>,

    #[serde(rename = "@manufacturer", default)]
    pub manufacturer: Option<String>,

    #[serde(rename = "@productname", default)]
    pub product_name: Option<String>,

    /// `"1"` when the device is reachable over DECT.
    #[serde(default)]
    pub present: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub switch: Option<SwitchInfo>,

    #[serde(default)]
    pub powermeter: Option<PowerMeter>,

    #[serde(default)]
    pub temperature: Option<TemperatureInfo>,

    /// Radiator controller block; only thermostats carry it.
    #[serde(default)]
    pub hkr: Option<HkrInfo>,
}

impl AhaDevice {
    pub fn is_present(&self) -> bool {
        self.present.as_deref().map(str::trim) == Some("1")
    }

    pub fn is_thermostat(&self) -> bool {
        self.hkr.is_some()
    }

    pub fn is_switch(&self) -> bool {
        self.switch.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SwitchInfo {
    /// `"1"` on, `"0"` off, empty when unknown.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub lock: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PowerMeter {
    /// Milliwatts.
    #[serde(default)]
    pub power: Option<String>,
    /// Watt hours since first use.
    #[serde(default)]
    pub energy: Option<String>,
    /// Millivolts.
    #[serde(default)]
    pub voltage: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemperatureInfo {
    /// Tenths of a degree Celsius, offset already applied.
    #[serde(default)]
    pub celsius: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HkrInfo {
    /// Measured temperature in half degrees.
    #[serde(default)]
    pub tist: Option<String>,
    /// Target temperature in half degrees; 253 off, 254 on.
    #[serde(default)]
    pub tsoll: Option<String>,
}

/// Decode an XML body, keeping a preview of it in the error.
pub(crate) fn parse_xml<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, Error> {
    quick_xml::de::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DEVICE_LIST: &str = r#"<devicelist version="1">
<device identifier="08761 0000434" id="17" functionbitmask="35712" fwversion="03.83" manufacturer="AVM" productname="FRITZ!DECT 200">
<present>1</present><txbusy>0</txbusy><name>Kaffeemaschine</name>
<switch><state>1</state><mode>manuell</mode><lock>0</lock><devicelock>0</devicelock></switch>
<powermeter><voltage>230051</voltage><power>12340</power><energy>707</energy></powermeter>
<temperature><celsius>285</celsius><offset>0</offset></temperature>
</device>
<device identifier="11960 0089208" id="20" functionbitmask="320" fwversion="03.54" manufacturer="AVM" productname="Comet DECT">
<present>0</present><name>Bad</name>
<temperature><celsius>210</celsius><offset>0</offset></temperature>
<hkr><tist>42</tist><tsoll>253</tsoll><absenk>34</absenk><komfort>42</komfort></hkr>
</device>
</devicelist>"#;

    #[test]
    fn parses_device_list() {
        let list: DeviceList = parse_xml(DEVICE_LIST).unwrap();
        assert_eq!(list.devices.len(), 2);

        let plug = &list.devices[0];
        assert_eq!(plug.identifier, "08761 0000434");
        assert_eq!(plug.product_name.as_deref(), Some("FRITZ!DECT 200"));
        assert!(plug.is_present());
        assert!(plug.is_switch());
        assert!(!plug.is_thermostat());
        let meter = plug.powermeter.as_ref().unwrap();
        assert_eq!(meter.power.as_deref(), Some("12340"));
        assert_eq!(meter.energy.as_deref(), Some("707"));

        let hkr = &list.devices[1];
        assert!(!hkr.is_present());
        assert!(hkr.is_thermostat());
        assert_eq!(hkr.hkr.as_ref().unwrap().tsoll.as_deref(), Some("253"));
    }

    #[test]
    fn parses_session_info() {
        let xml = "<?xml version=\"1.0\" encoding=\"utf-8\"?><SessionInfo><SID>0000000000000000</SID>\
                   <Challenge>1234567z</Challenge><BlockTime>12</BlockTime><Rights></Rights></SessionInfo>";
        let info: SessionInfo = parse_xml(xml).unwrap();
        assert_eq!(info.sid, "0000000000000000");
        assert_eq!(info.challenge, "1234567z");
        assert_eq!(info.block_time_secs(), 12);
    }

    #[test]
    fn garbage_is_deserialization_error() {
        let err = parse_xml::<SessionInfo>("<html>nope").unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }
}
