// ── Device storage ──

mod table;

pub use table::{DeviceList, DeviceTable};
