//! `fritzmon monitor`: follow calls and device refreshes until a
//! termination signal arrives.

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use fritzmon_core::{CallEventName, CallNotification, HubEvent, shutdown_on_signal};

use crate::cli::{GlobalOpts, MonitorArgs, OutputFormat};
use crate::config::ResolvedProfile;
use crate::error::CliError;
use crate::output;

/// Renders call notifications to stdout and hub events to stderr.
struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn call(&self, n: &CallNotification) -> Result<(), CliError> {
        let out = output::render_single(
            &self.format,
            n,
            |n| self.call_line(n),
            |n| format!("{} {}", n.name, n.remote_number.as_deref().unwrap_or("-")),
        )?;
        output::print_output(&out, self.quiet);
        Ok(())
    }

    fn call_line(&self, n: &CallNotification) -> String {
        let label = format!("{:<17}", n.name.to_string());
        let label = if self.color {
            match n.name {
                CallEventName::IncomingCall => label.yellow().to_string(),
                CallEventName::OutgoingCall => label.cyan().to_string(),
                CallEventName::CallAnswered => label.green().to_string(),
                CallEventName::CallDisconnected => label.dimmed().to_string(),
                CallEventName::MissedCall => label.red().bold().to_string(),
            }
        } else {
            label
        };

        let mut line = format!(
            "{}  {label} {:<16} {}",
            n.timestamp.format("%Y-%m-%d %H:%M:%S"),
            n.remote_number.as_deref().unwrap_or("-"),
            n.resolved_name,
        );
        if let Some(secs) = n.duration_seconds() {
            line.push_str(&format!(" ({}:{:02})", secs / 60, secs % 60));
        }
        line
    }

    fn hub_event(&self, event: &HubEvent) {
        if self.quiet {
            return;
        }
        match event {
            HubEvent::RouterAvailable => eprintln!("router available"),
            HubEvent::AuthRequired => {
                eprintln!("router login required, run: fritzmon config set-password");
            }
            HubEvent::DevicesRefreshed { devices, failures } => {
                if *failures == 0 {
                    eprintln!("devices refreshed: {devices}");
                } else {
                    eprintln!("devices refreshed: {devices} ({failures} failed)");
                }
            }
            HubEvent::CallMonitor(state) => eprintln!("call monitor: {state}"),
        }
    }
}

pub async fn handle(
    mut resolved: ResolvedProfile,
    args: &MonitorArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.no_devices {
        resolved.hub.device_polling_enabled = false;
    }
    if args.no_calls {
        resolved.hub.call_monitor_enabled = false;
    }
    if let Some(port) = args.port {
        resolved.hub.monitor_port = port;
    }
    let target = format!("{}:{}", resolved.hub.monitor_host, resolved.hub.monitor_port);

    let hub = resolved.into_hub();
    let mut calls = hub.subscribe_calls();
    let mut events = hub.subscribe_events();

    hub.start().await?;
    if !global.quiet {
        eprintln!("Watching {target} (Ctrl-C to stop)");
    }

    let printer = Printer {
        format: global.output.clone(),
        color: output::should_color(&global.color),
        quiet: global.quiet,
    };
    let mut signal = tokio::spawn(shutdown_on_signal(hub.clone()));

    let result = loop {
        tokio::select! {
            joined = &mut signal => {
                break match joined {
                    Ok(outcome) => outcome.map_err(CliError::from),
                    Err(e) => Err(CliError::ApiError {
                        code: "internal".into(),
                        message: format!("signal handler failed: {e}"),
                    }),
                };
            }
            call = calls.recv() => match call {
                Ok(notification) => {
                    if let Err(e) = printer.call(&notification) {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "call output fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
            event = events.recv() => match event {
                Ok(event) => printer.hub_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    signal.abort();
    hub.shutdown().await;
    result
}
