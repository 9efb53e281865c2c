// AVM Home Automation (AHA) HTTP interface
//
// Session login via `/login_sid.lua` plus the `homeautoswitch.lua`
// webservice for listing, reading and switching smart-home devices.

pub mod client;
mod login;
pub mod models;

pub use client::AhaClient;
pub use models::{
    AhaDevice, DeviceList, HkrInfo, PowerMeter, SessionInfo, SwitchInfo, TemperatureInfo,
};
