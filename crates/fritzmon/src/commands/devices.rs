//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;

use fritzmon_core::{DeviceSnapshot, DeviceState, Hub, PollReport};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, SwitchState};
use crate::config::ResolvedProfile;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "AIN")]
    ain: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Present")]
    present: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Reading")]
    reading: String,
}

impl From<&Arc<DeviceSnapshot>> for DeviceRow {
    fn from(d: &Arc<DeviceSnapshot>) -> Self {
        Self {
            ain: d.id.clone(),
            name: d.name.clone().unwrap_or_default(),
            kind: d.kind.to_string(),
            model: d.model.clone().unwrap_or_default(),
            present: if d.present { "yes" } else { "no" }.into(),
            state: state_label(d.state.as_ref()),
            reading: reading_label(d.state.as_ref()),
        }
    }
}

fn state_label(state: Option<&DeviceState>) -> String {
    match state {
        Some(DeviceState::Socket(s)) => if s.onoff { "on" } else { "off" }.into(),
        Some(DeviceState::Thermostat(t)) => t
            .target_c
            .map_or_else(|| "manual".into(), |target| format!("{target:.1} °C")),
        None => "-".into(),
    }
}

fn reading_label(state: Option<&DeviceState>) -> String {
    match state {
        Some(DeviceState::Socket(s)) => format!("{:.1} W / {:.3} kWh", s.power_w, s.energy_kwh),
        Some(DeviceState::Thermostat(t)) => format!("{:.1} °C", t.measured_c),
        None => "-".into(),
    }
}

fn detail(d: &Arc<DeviceSnapshot>) -> String {
    let mut lines = vec![
        format!("AIN:          {}", d.id),
        format!("Name:         {}", d.name.as_deref().unwrap_or("-")),
        format!("Kind:         {}", d.kind),
        format!("Model:        {}", d.model.as_deref().unwrap_or("-")),
        format!("Manufacturer: {}", d.manufacturer.as_deref().unwrap_or("-")),
        format!("Firmware:     {}", d.firmware.as_deref().unwrap_or("-")),
        format!("Icon:         {}", d.icon()),
        format!("Present:      {}", if d.present { "yes" } else { "no" }),
    ];
    match d.state {
        Some(DeviceState::Socket(s)) => {
            lines.push(format!("Switch:       {}", if s.onoff { "on" } else { "off" }));
            lines.push(format!("Power:        {:.2} W", s.power_w));
            lines.push(format!("Energy:       {:.3} kWh", s.energy_kwh));
            lines.push(format!("Temperature:  {:.1} °C", s.temperature_c));
        }
        Some(DeviceState::Thermostat(t)) => {
            lines.push(format!("Measured:     {:.1} °C", t.measured_c));
            lines.push(format!(
                "Target:       {}",
                t.target_c
                    .map_or_else(|| "valve forced".into(), |v| format!("{v:.1} °C"))
            ));
        }
        None => lines.push("Readings:     none yet".into()),
    }
    lines.push(format!("Updated:      {}", d.updated_at.to_rfc3339()));
    lines.join("\n")
}

fn warn_failures(report: &PollReport, quiet: bool) {
    if quiet {
        return;
    }
    for failure in &report.failures {
        eprintln!("warning: {}", failure.reason);
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    mut resolved: ResolvedProfile,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // One-shot: log in, poll once, and leave the call monitor alone.
    resolved.hub.call_monitor_enabled = false;
    resolved.hub.device_polling_enabled = true;
    let hub = resolved.into_hub();

    let result = run(&hub, args, global).await;
    hub.shutdown().await;
    result
}

async fn run(hub: &Hub, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let report = hub.connect_router().await?;
    warn_failures(&report, global.quiet);

    match args.command {
        DevicesCommand::List => {
            let devices = hub.devices().latest();
            let out = output::render_list(
                &global.output,
                devices.as_slice(),
                |d| DeviceRow::from(d),
                |d| d.unique_id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { ain } => {
            let device = hub.device(&ain).ok_or_else(|| CliError::NotFound {
                resource_type: "device".into(),
                identifier: ain.clone(),
                list_command: "devices list".into(),
            })?;
            let out = output::render_single(&global.output, &device, detail, |d| {
                d.unique_id.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Switch { ain, state } => {
            let on = match state {
                SwitchState::On => true,
                SwitchState::Off => false,
                SwitchState::Toggle => !hub
                    .device(&ain)
                    .and_then(|d| d.socket().map(|s| s.onoff))
                    .unwrap_or(false),
            };
            let now = hub.set_switch(&ain, on).await?;
            if !global.quiet {
                eprintln!("✓ Socket {ain} is {}", if now { "on" } else { "off" });
            }
            Ok(())
        }
    }
}
