// ── Domain model ──

pub mod call;
pub mod device;

pub use call::{CallDirection, CallEventName, CallNotification, CallPhase, CallSession};
pub use device::{
    DeviceKind, DeviceSnapshot, DeviceState, SocketState, ThermostatState, unique_id,
};
